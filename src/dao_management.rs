// src/dao_management.rs

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Datelike, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::doc;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::errors::DomainError;
use crate::models::dao::{default_checklist, CreateDaoRequest, Dao, UpdateDaoRequest};
use crate::policy::{authorize, Action};
use crate::progress::{
    calculate_dao_progress, dao_number_is_valid, dao_status_today, days_remaining, next_dao_number,
};
use crate::task_rules::{add_task, replace_equipe};

fn daos_collection(data: &web::Data<AppState>) -> mongodb::Collection<Dao> {
    data.mongodb.db.collection::<Dao>("daos")
}

pub async fn load_dao(data: &web::Data<AppState>, dao_id: &str) -> Result<Dao, DomainError> {
    daos_collection(data)
        .find_one(doc! { "id": dao_id })
        .await?
        .ok_or_else(|| DomainError::not_found(format!("dao {}", dao_id)))
}

pub async fn save_dao(data: &web::Data<AppState>, dao: &Dao) -> Result<(), DomainError> {
    daos_collection(data)
        .replace_one(doc! { "id": &dao.id }, dao)
        .await?;
    Ok(())
}

/// GET /daos
pub async fn list_daos(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ReadDao)?;

    let mut cursor = daos_collection(&data).find(doc! {}).await?;
    let mut daos: Vec<Dao> = Vec::new();
    while let Some(dao_res) = cursor.next().await {
        match dao_res {
            Ok(dao) => daos.push(dao),
            Err(err) => {
                error!("Error iterating daos: {}", err);
                return Err(err.into());
            }
        }
    }
    daos.sort_by(|a, b| a.numero_liste.cmp(&b.numero_liste));
    Ok(HttpResponse::Ok().json(daos))
}

/// GET /daos/{dao_id}
pub async fn get_dao(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ReadDao)?;
    let dao = load_dao(&data, &path).await?;
    Ok(HttpResponse::Ok().json(dao))
}

/// GET /daos/{dao_id}/status — derived values, never persisted.
pub async fn get_dao_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::ReadDao)?;
    let dao = load_dao(&data, &path).await?;

    let progress = calculate_dao_progress(&dao.tasks);
    let status = dao_status_today(dao.date_depot, progress);
    let days = days_remaining(dao.date_depot, Utc::now().date_naive());
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "progress": progress,
        "status": status,
        "daysRemaining": days,
    })))
}

/// POST /daos
pub async fn create_dao(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateDaoRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::CreateDao)?;
    let payload = payload.into_inner();

    let numero_liste = match payload.numero_liste {
        Some(numero) => {
            if !dao_number_is_valid(&numero) {
                return Err(DomainError::validation(
                    "numeroListe",
                    "expected DAO-<year>-<3-digit-seq>",
                ));
            }
            if daos_collection(&data)
                .find_one(doc! { "numeroListe": &numero })
                .await?
                .is_some()
            {
                return Err(DomainError::Conflict(format!(
                    "numeroListe {} already exists",
                    numero
                )));
            }
            numero
        }
        None => {
            let existing: Vec<String> = daos_collection(&data)
                .distinct("numeroListe", doc! {})
                .await?
                .iter()
                .filter_map(|b| b.as_str().map(str::to_string))
                .collect();
            next_dao_number(&existing, Utc::now().year())?
        }
    };

    let now = Utc::now();
    let mut dao = Dao {
        id: Uuid::new_v4().to_string(),
        numero_liste,
        objet_dossier: payload.objet_dossier,
        reference: payload.reference,
        autorite_contractante: payload.autorite_contractante,
        date_depot: payload.date_depot,
        equipe: payload.equipe,
        tasks: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    match payload.tasks {
        Some(drafts) => {
            for draft in drafts {
                add_task(&mut dao, draft, &auth.user_id, now)?;
            }
        }
        None => dao.tasks = default_checklist(),
    }
    dao.validate()?;

    daos_collection(&data).insert_one(&dao).await?;
    info!("dao {} created ({})", dao.id, dao.numero_liste);
    Ok(HttpResponse::Created().json(dao))
}

/// PUT /daos/{dao_id} — non-task fields only; the checklist has its own routes.
pub async fn update_dao(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateDaoRequest>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::UpdateDaoFields)?;

    let mut dao = load_dao(&data, &path).await?;
    let payload = payload.into_inner();
    let now = Utc::now();

    if let Some(objet) = payload.objet_dossier {
        if objet.trim().is_empty() {
            return Err(DomainError::validation("objetDossier", "must not be empty"));
        }
        dao.objet_dossier = objet;
    }
    if let Some(reference) = payload.reference {
        dao.reference = reference;
    }
    if let Some(autorite) = payload.autorite_contractante {
        dao.autorite_contractante = autorite;
    }
    if let Some(date_depot) = payload.date_depot {
        dao.date_depot = date_depot;
    }
    if let Some(equipe) = payload.equipe {
        replace_equipe(&mut dao, equipe, &auth.user_id, now)?;
    }

    dao.updated_at = now;
    dao.validate()?;
    save_dao(&data, &dao).await?;
    Ok(HttpResponse::Ok().json(dao))
}

/// DELETE /daos/{dao_id} — cascades to the dossier's comments.
pub async fn delete_dao(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let auth = current_user(&req)?;
    authorize(auth.role, Action::DeleteDao)?;

    let dao_id = path.into_inner();
    let result = daos_collection(&data).delete_one(doc! { "id": &dao_id }).await?;
    if result.deleted_count == 0 {
        return Err(DomainError::not_found(format!("dao {}", dao_id)));
    }

    data.mongodb
        .db
        .collection::<crate::models::Comment>("comments")
        .delete_many(doc! { "daoId": &dao_id })
        .await?;

    info!("dao {} deleted by {}", dao_id, auth.user_id);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "dao deleted" })))
}
