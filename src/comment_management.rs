// src/comment_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::dao_management::load_dao;
use crate::errors::DomainError;
use crate::models::comment::{Comment, CreateCommentRequest, UpdateCommentRequest};
use crate::models::user::User;
use crate::policy::{authorize, can_modify_comment, Action};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentQuery {
    #[serde(default)]
    pub task_id: Option<u32>,
}

fn comments_collection(data: &web::Data<AppState>) -> mongodb::Collection<Comment> {
    data.mongodb.db.collection::<Comment>("comments")
}

async fn load_comment(data: &web::Data<AppState>, id: &str) -> Result<Comment, DomainError> {
    comments_collection(data)
        .find_one(doc! { "id": id })
        .await?
        .ok_or_else(|| DomainError::not_found(format!("comment {}", id)))
}

/// GET /comments/dao/{dao_id}?taskId=N
pub async fn list_comments(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<CommentQuery>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ReadComments)?;

    let mut filter = doc! { "daoId": path.as_str() };
    if let Some(task_id) = query.task_id {
        filter.insert("taskId", i64::from(task_id));
    }

    let mut cursor = comments_collection(&data).find(filter).await?;
    let mut comments: Vec<Comment> = Vec::new();
    while let Some(comment_res) = cursor.next().await {
        match comment_res {
            Ok(comment) => comments.push(comment),
            Err(err) => {
                error!("Error iterating comments: {}", err);
                return Err(err.into());
            }
        }
    }
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(HttpResponse::Ok().json(comments))
}

/// POST /comments
pub async fn create_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::WriteComment)?;

    if payload.content.trim().is_empty() {
        return Err(DomainError::validation("content", "must not be empty"));
    }

    // The referenced dossier and task must both exist.
    let dao = load_dao(&data, &payload.dao_id).await?;
    if dao.task(payload.task_id).is_none() {
        return Err(DomainError::not_found(format!("task {}", payload.task_id)));
    }

    // Denormalized so the comment keeps its author's name as of writing.
    let author = data
        .mongodb
        .db
        .collection::<User>("users")
        .find_one(doc! { "id": &auth.user_id })
        .await?
        .ok_or_else(|| DomainError::not_found("user"))?;

    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        dao_id: payload.dao_id.clone(),
        task_id: payload.task_id,
        user_id: auth.user_id.clone(),
        user_name: author.name,
        content: payload.content.trim().to_string(),
        created_at: Utc::now(),
    };
    comments_collection(&data).insert_one(&comment).await?;

    info!("comment {} added on dao {} task {}", comment.id, comment.dao_id, comment.task_id);
    Ok(HttpResponse::Created().json(comment))
}

/// PUT /comments/{id} — author or admin.
pub async fn update_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::WriteComment)?;

    let mut comment = load_comment(&data, &path).await?;
    if !can_modify_comment(auth.role, &auth.user_id, &comment.user_id) {
        return Err(DomainError::Forbidden(
            "only the author or an admin can edit a comment".to_string(),
        ));
    }
    if payload.content.trim().is_empty() {
        return Err(DomainError::validation("content", "must not be empty"));
    }

    comment.content = payload.content.trim().to_string();
    comments_collection(&data)
        .replace_one(doc! { "id": &comment.id }, &comment)
        .await?;
    Ok(HttpResponse::Ok().json(comment))
}

/// DELETE /comments/{id} — author or admin.
pub async fn delete_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::WriteComment)?;

    let comment = load_comment(&data, &path).await?;
    if !can_modify_comment(auth.role, &auth.user_id, &comment.user_id) {
        return Err(DomainError::Forbidden(
            "only the author or an admin can delete a comment".to_string(),
        ));
    }

    comments_collection(&data)
        .delete_one(doc! { "id": &comment.id })
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "comment deleted" })))
}
