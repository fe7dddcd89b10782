// src/main.rs

mod app_state;
mod auth;
mod comment_management;
mod config;
mod dao_db;
mod dao_management;
mod errors;
mod models;
mod policy;
mod progress;
mod task_management;
mod task_rules;
mod user_management;

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures_util::future::{ok, Ready};
use log::info;

use crate::app_state::AppState;
use crate::auth::{
    change_password, forgot_password, login, me, reset_password, validate_jwt, AuthUser,
};
use crate::comment_management::{create_comment, delete_comment, list_comments, update_comment};
use crate::dao_management::{
    create_dao, delete_dao, get_dao, get_dao_status, list_daos, update_dao,
};
use crate::task_management::{
    add_task_handler, assign_task_handler, delete_task_handler, unassign_task_handler,
    update_task_handler,
};
use crate::user_management::{
    create_user, deactivate_user, get_user_by_id, list_users, update_profile,
};

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present.
        // A missing header leaves the request anonymous (handlers answer 401);
        // a present but invalid/expired token is answered 401 right here.
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    match verify_token(&token) {
                        Ok(user) => {
                            req.extensions_mut().insert(user);
                        }
                        Err(_) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .json(serde_json::json!({ "error": "invalid or expired token" }))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn verify_token(token: &str) -> Result<AuthUser, jsonwebtoken::errors::Error> {
    let secret = env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string());
    let claims = validate_jwt(token, &secret)?;
    Ok(AuthUser {
        user_id: claims.sub,
        role: claims.role,
    })
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(dao_db::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    mongodb.ensure_seed_admin(&config).await;

    let frontend_origin = config.frontend_origin.clone();
    info!("Server running at http://0.0.0.0:8080");
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
            }))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(login))
                    .route("/forgot-password", web::post().to(forgot_password))
                    .route("/reset-password", web::post().to(reset_password))
                    .route("/change-password", web::post().to(change_password))
                    .route("/me", web::get().to(me)),
            )
            // DAOS
            .service(
                web::scope("/daos")
                    .route("", web::get().to(list_daos))
                    .route("", web::post().to(create_dao))
                    .service(
                        web::scope("/{dao_id}")
                            .route("", web::get().to(get_dao))
                            .route("", web::put().to(update_dao))
                            .route("", web::delete().to(delete_dao))
                            .route("/status", web::get().to(get_dao_status))
                            .service(
                                web::scope("/tasks")
                                    .route("", web::post().to(add_task_handler))
                                    .route("/{task_id}", web::put().to(update_task_handler))
                                    .route("/{task_id}", web::delete().to(delete_task_handler))
                                    .route("/{task_id}/assign", web::put().to(assign_task_handler))
                                    .route(
                                        "/{task_id}/unassign",
                                        web::put().to(unassign_task_handler),
                                    ),
                            ),
                    ),
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("", web::get().to(list_users))
                    .route("", web::post().to(create_user))
                    .route("/profile", web::put().to(update_profile))
                    .route("/{id}", web::get().to(get_user_by_id))
                    .route("/{id}/deactivate", web::put().to(deactivate_user)),
            )
            // COMMENTS
            .service(
                web::scope("/comments")
                    .route("/dao/{dao_id}", web::get().to(list_comments))
                    .route("", web::post().to(create_comment))
                    .route("/{id}", web::put().to(update_comment))
                    .route("/{id}", web::delete().to(delete_comment)),
            )
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
