//! Optica POS API Library
//!
//! Backend for an optical retail store: point of sale, lens lab workflow,
//! inventory with a movement ledger, reporting, commissions and expenses.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod request_id;
pub mod services;

use axum::{extract::FromRef, response::Json, routing::get, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth_service: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

// Lets the AuthenticatedUser extractor pull the auth service straight from state
impl FromRef<AppState> for Arc<auth::AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth_service.clone()
    }
}

/// Envelope for the status endpoint
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// Service name and version, useful as a smoke check behind load balancers
pub async fn api_status() -> Json<ApiResponse<Value>> {
    Json(ApiResponse::success(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

/// Full API surface under `/api`.
///
/// Only token issuance and registration are public; everything else needs a
/// bearer token, and the admin group additionally requires the admin flag.
pub fn api_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/status", get(api_status))
        .merge(handlers::users::public_routes());

    let authenticated = Router::new()
        .merge(handlers::users::routes())
        .merge(handlers::pos::routes())
        .merge(handlers::lab_orders::routes())
        .merge(handlers::inventory::routes())
        .merge(handlers::reports::routes())
        .merge(handlers::commissions::routes())
        .with_auth();

    let admin = Router::new()
        .merge(handlers::users::admin_routes())
        .merge(handlers::commissions::admin_routes())
        .merge(handlers::expenses::admin_routes())
        .with_admin();

    Router::new().nest("/api", public.merge(authenticated).merge(admin))
}
