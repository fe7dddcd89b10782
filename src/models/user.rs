use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::DomainError;

/// Reset tokens are single-use and die 15 minutes after issuance.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "user")]
    User,
}

/// Stored user document. The password hash and reset-token fields are for the
/// persistence layer only; every outward response goes through [`UserInfo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Stored lowercased; uniqueness is case-insensitive.
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            last_login: self.last_login,
        }
    }

    /// Replaces any previously issued token; a user has at most one active.
    pub fn issue_reset_token(&mut self, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().to_string();
        self.reset_token = Some(token.clone());
        self.reset_token_expires = Some(now + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        token
    }

    pub fn verify_reset_token(&self, token: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        let (stored, expires) = match (&self.reset_token, self.reset_token_expires) {
            (Some(stored), Some(expires)) => (stored, expires),
            _ => return Err(DomainError::Unauthorized("no active reset token".to_string())),
        };
        if stored != token {
            return Err(DomainError::Unauthorized("invalid reset token".to_string()));
        }
        if now >= expires {
            return Err(DomainError::Unauthorized("reset token expired".to_string()));
        }
        Ok(())
    }

    pub fn clear_reset_token(&mut self) {
        self.reset_token = None;
        self.reset_token_expires = None;
    }
}

/// Outward-facing projection of a user; never carries the password hash or
/// reset-token fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    if re.is_match(email) {
        Ok(())
    } else {
        Err(DomainError::validation("email", "malformed email address"))
    }
}

pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.len() < 8 {
        return Err(DomainError::validation(
            "password",
            "must be at least 8 characters",
        ));
    }
    Ok(())
}
