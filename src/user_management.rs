// src/user_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user, find_user_by_email, hash_password};
use crate::errors::DomainError;
use crate::models::user::{
    normalize_email, validate_email, validate_password, User, UserInfo, UserRole,
};
use crate::policy::{authorize, check_deactivation, Action};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

fn users_collection(data: &web::Data<AppState>) -> mongodb::Collection<User> {
    data.mongodb.db.collection::<User>("users")
}

async fn load_user(data: &web::Data<AppState>, user_id: &str) -> Result<User, DomainError> {
    users_collection(data)
        .find_one(doc! { "id": user_id })
        .await?
        .ok_or_else(|| DomainError::not_found(format!("user {}", user_id)))
}

async fn save_user(data: &web::Data<AppState>, user: &User) -> Result<(), DomainError> {
    users_collection(data)
        .replace_one(doc! { "id": &user.id }, user)
        .await?;
    Ok(())
}

/// GET /users — active accounts only; deactivated users stay out of listings.
pub async fn list_users(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ManageUsers)?;

    let mut cursor = users_collection(&data)
        .find(doc! { "isActive": true })
        .await?;
    let mut users: Vec<UserInfo> = Vec::new();
    while let Some(user_res) = cursor.next().await {
        match user_res {
            Ok(user) => users.push(user.to_info()),
            Err(err) => {
                error!("Error iterating users: {}", err);
                return Err(err.into());
            }
        }
    }
    Ok(HttpResponse::Ok().json(users))
}

/// GET /users/{id}
pub async fn get_user_by_id(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    current_user(&req)?;
    let user = load_user(&data, &path).await?;
    Ok(HttpResponse::Ok().json(user.to_info()))
}

/// POST /users
pub async fn create_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ManageUsers)?;

    if payload.name.trim().is_empty() {
        return Err(DomainError::validation("name", "must not be empty"));
    }
    let email = normalize_email(&payload.email);
    validate_email(&email)?;
    validate_password(&payload.password)?;
    if find_user_by_email(&data, &email).await?.is_some() {
        return Err(DomainError::Conflict(format!("email {} already exists", email)));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email,
        password: hash_password(&payload.password)?,
        role: payload.role,
        is_active: true,
        last_login: None,
        reset_token: None,
        reset_token_expires: None,
        created_at: Utc::now(),
    };
    users_collection(&data).insert_one(&user).await?;

    info!("user {} created by {}", user.id, auth.user_id);
    Ok(HttpResponse::Created().json(user.to_info()))
}

/// PUT /users/{id}/deactivate — soft delete; accounts are never hard-deleted.
pub async fn deactivate_user(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ManageUsers)?;
    check_deactivation(&auth.user_id, &path)?;

    let mut user = load_user(&data, &path).await?;
    user.is_active = false;
    // A dead account keeps no live reset token around.
    user.clear_reset_token();
    save_user(&data, &user).await?;

    info!("user {} deactivated by {}", user.id, auth.user_id);
    Ok(HttpResponse::Ok().json(user.to_info()))
}

/// PUT /users/profile — own name/email.
pub async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::UpdateOwnProfile)?;

    let mut user = load_user(&data, &auth.user_id).await?;
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(DomainError::validation("name", "must not be empty"));
        }
        user.name = name.trim().to_string();
    }
    if let Some(email) = &payload.email {
        let email = normalize_email(email);
        validate_email(&email)?;
        if email != user.email && find_user_by_email(&data, &email).await?.is_some() {
            return Err(DomainError::Conflict(format!("email {} already exists", email)));
        }
        user.email = email;
    }
    save_user(&data, &user).await?;
    Ok(HttpResponse::Ok().json(user.to_info()))
}
