// src/task_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::info;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::dao_management::{load_dao, save_dao};
use crate::errors::DomainError;
use crate::models::dao::TaskDraft;
use crate::policy::{authorize, Action};
use crate::task_rules::{add_task, assign_task, delete_task, unassign_task, update_task, TaskPatch};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskRequest {
    pub member_id: String,
}

/// POST /daos/{dao_id}/tasks
pub async fn add_task_handler(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<TaskDraft>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ManageTaskStructure)?;

    let mut dao = load_dao(&data, &path).await?;
    let now = Utc::now();
    let task_id = add_task(&mut dao, payload.into_inner(), &auth.user_id, now)?;
    save_dao(&data, &dao).await?;

    info!("task {} added to dao {} by {}", task_id, dao.id, auth.user_id);
    Ok(HttpResponse::Created().json(dao))
}

/// PUT /daos/{dao_id}/tasks/{task_id}
pub async fn update_task_handler(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, u32)>,
    payload: web::Json<TaskPatch>,
) -> Result<HttpResponse, DomainError> {
    let (dao_id, task_id) = path.into_inner();
    let auth = current_user(&req)?;
    let patch = payload.into_inner();

    // Renaming is structural; everything else on a task is a regular update.
    if patch.renames() {
        authorize(auth.role, Action::ManageTaskStructure)?;
    } else {
        authorize(auth.role, Action::UpdateTask)?;
    }

    let mut dao = load_dao(&data, &dao_id).await?;
    update_task(&mut dao, task_id, &patch, &auth.user_id, Utc::now())?;
    save_dao(&data, &dao).await?;
    Ok(HttpResponse::Ok().json(dao))
}

/// DELETE /daos/{dao_id}/tasks/{task_id}
pub async fn delete_task_handler(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, u32)>,
) -> Result<HttpResponse, DomainError> {
    let (dao_id, task_id) = path.into_inner();
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ManageTaskStructure)?;

    let mut dao = load_dao(&data, &dao_id).await?;
    delete_task(&mut dao, task_id, Utc::now())?;
    save_dao(&data, &dao).await?;

    info!("task {} removed from dao {} by {}", task_id, dao_id, auth.user_id);
    Ok(HttpResponse::Ok().json(dao))
}

/// PUT /daos/{dao_id}/tasks/{task_id}/assign
pub async fn assign_task_handler(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, u32)>,
    payload: web::Json<AssignTaskRequest>,
) -> Result<HttpResponse, DomainError> {
    let (dao_id, task_id) = path.into_inner();
    let auth = current_user(&req)?;
    authorize(auth.role, Action::UpdateTask)?;

    let mut dao = load_dao(&data, &dao_id).await?;
    assign_task(&mut dao, task_id, &payload.member_id, &auth.user_id, Utc::now())?;
    save_dao(&data, &dao).await?;
    Ok(HttpResponse::Ok().json(dao))
}

/// PUT /daos/{dao_id}/tasks/{task_id}/unassign
pub async fn unassign_task_handler(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, u32)>,
) -> Result<HttpResponse, DomainError> {
    let (dao_id, task_id) = path.into_inner();
    let auth = current_user(&req)?;
    authorize(auth.role, Action::UpdateTask)?;

    let mut dao = load_dao(&data, &dao_id).await?;
    unassign_task(&mut dao, task_id, &auth.user_id, Utc::now())?;
    save_dao(&data, &dao).await?;
    Ok(HttpResponse::Ok().json(dao))
}
