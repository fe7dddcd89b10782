// src/auth.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{info, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::errors::DomainError;
use crate::models::user::{normalize_email, validate_password, User, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: UserRole,
    pub exp: usize,
}

/// Identity derived once per request by the auth middleware and attached
/// read-only to the request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub role: UserRole,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// JWT Creation
pub fn create_jwt(user_id: &str, role: UserRole, secret: &str) -> Result<String, DomainError> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|_| DomainError::Storage("failed to sign token".to_string()))
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Identity attached by the middleware, or `Unauthorized` when the request
/// carried no credential.
pub fn current_user(req: &HttpRequest) -> Result<AuthUser, DomainError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| DomainError::Unauthorized("authentication required".to_string()))
}

pub fn hash_password(password: &str) -> Result<String, DomainError> {
    hash(password, DEFAULT_COST)
        .map_err(|_| DomainError::Storage("failed to hash password".to_string()))
}

fn users_collection(data: &web::Data<AppState>) -> mongodb::Collection<User> {
    data.mongodb.db.collection::<User>("users")
}

async fn save_user(data: &web::Data<AppState>, user: &User) -> Result<(), DomainError> {
    users_collection(data)
        .replace_one(doc! { "id": &user.id }, user)
        .await?;
    Ok(())
}

pub async fn find_user_by_email(
    data: &web::Data<AppState>,
    email: &str,
) -> Result<Option<User>, DomainError> {
    let user = users_collection(data)
        .find_one(doc! { "email": normalize_email(email) })
        .await?;
    Ok(user)
}

// Login Endpoint
pub async fn login(
    data: web::Data<AppState>,
    login_info: web::Json<LoginRequest>,
) -> Result<HttpResponse, DomainError> {
    let mut user = find_user_by_email(&data, &login_info.email)
        .await?
        .ok_or_else(|| DomainError::Unauthorized("invalid credentials".to_string()))?;

    if !user.is_active {
        return Err(DomainError::Unauthorized("account is deactivated".to_string()));
    }
    if !verify(&login_info.password, &user.password).unwrap_or(false) {
        return Err(DomainError::Unauthorized("invalid credentials".to_string()));
    }

    user.last_login = Some(Utc::now());
    save_user(&data, &user).await?;

    let token = create_jwt(&user.id, user.role, &data.config.jwt_secret)?;
    info!("user {} logged in", user.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "token": token, "user": user.to_info() })))
}

// Issues a reset token. The answer is the same whether or not the email is
// known, so the endpoint cannot be used to enumerate accounts. Delivery is the
// mailer collaborator's job; the token is only logged here.
pub async fn forgot_password(
    data: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, DomainError> {
    if let Some(mut user) = find_user_by_email(&data, &body.email).await? {
        if user.is_active {
            let token = user.issue_reset_token(Utc::now());
            save_user(&data, &user).await?;
            info!("password reset token issued for user {}: {}", user.id, token);
        } else {
            warn!("password reset requested for deactivated user {}", user.id);
        }
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "reset requested" })))
}

pub async fn reset_password(
    data: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, DomainError> {
    let mut user = find_user_by_email(&data, &body.email)
        .await?
        .ok_or_else(|| DomainError::Unauthorized("invalid reset token".to_string()))?;

    user.verify_reset_token(&body.token, Utc::now())?;
    validate_password(&body.new_password)?;

    user.password = hash_password(&body.new_password)?;
    user.clear_reset_token();
    save_user(&data, &user).await?;

    info!("password reset for user {}", user.id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "password reset" })))
}

pub async fn change_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    let mut user = users_collection(&data)
        .find_one(doc! { "id": &auth.user_id })
        .await?
        .ok_or_else(|| DomainError::not_found("user"))?;

    if !verify(&body.current_password, &user.password).unwrap_or(false) {
        return Err(DomainError::Unauthorized("invalid credentials".to_string()));
    }
    validate_password(&body.new_password)?;

    user.password = hash_password(&body.new_password)?;
    save_user(&data, &user).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "password changed" })))
}

pub async fn me(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    let user = users_collection(&data)
        .find_one(doc! { "id": &auth.user_id })
        .await?
        .ok_or_else(|| DomainError::not_found("user"))?;
    Ok(HttpResponse::Ok().json(user.to_info()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let token = create_jwt("u-42", UserRole::Admin, "test-secret").unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "u-42");
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_jwt_rejects_wrong_secret() {
        let token = create_jwt("u-42", UserRole::User, "test-secret").unwrap();
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn test_jwt_rejects_garbage() {
        assert!(validate_jwt("not.a.token", "test-secret").is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = hash_password("correct horse battery staple").unwrap();
        assert!(verify("correct horse battery staple", &hashed).unwrap());
        assert!(!verify("wrong", &hashed).unwrap());
    }
}
