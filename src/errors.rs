// src/errors.rs

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use serde_json::json;
use std::fmt;

/// Typed failures returned by the rule functions and handlers.
///
/// `Storage` is opaque on the wire: the detail is logged server-side and the
/// caller only sees a generic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    Validation { field: String, message: String },
    NotFound(String),
    Conflict(String),
    InvalidReference(String),
    Forbidden(String),
    Unauthorized(String),
    Storage(String),
}

impl DomainError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        DomainError::NotFound(what.into())
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::Validation { field, message } => {
                write!(f, "invalid {}: {}", field, message)
            }
            DomainError::NotFound(what) => write!(f, "{} not found", what),
            DomainError::Conflict(what) => write!(f, "conflict: {}", what),
            DomainError::InvalidReference(what) => write!(f, "invalid reference: {}", what),
            DomainError::Forbidden(what) => write!(f, "forbidden: {}", what),
            DomainError::Unauthorized(what) => write!(f, "unauthorized: {}", what),
            DomainError::Storage(detail) => write!(f, "storage error: {}", detail),
        }
    }
}

impl std::error::Error for DomainError {}

impl From<mongodb::error::Error> for DomainError {
    fn from(err: mongodb::error::Error) -> Self {
        DomainError::Storage(err.to_string())
    }
}

impl ResponseError for DomainError {
    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::Validation { .. } => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::InvalidReference(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            DomainError::Validation { field, message } => {
                json!({ "error": self.to_string(), "field": field, "message": message })
            }
            // Never leak driver internals to the caller.
            DomainError::Storage(detail) => {
                error!("storage error: {}", detail);
                json!({ "error": "internal storage error" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DomainError::validation("progress", "out of range").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DomainError::not_found("task 9").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DomainError::Conflict("numeroListe".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            DomainError::InvalidReference("member x".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            DomainError::Forbidden("admin only".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            DomainError::Unauthorized("expired".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_storage_detail_not_in_display_body() {
        // The Display string carries the detail for logs; the HTTP body must not.
        let err = DomainError::Storage("connection pool exhausted".into());
        let resp = err.error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
