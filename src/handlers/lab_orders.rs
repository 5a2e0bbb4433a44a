use super::common::{created_response, success_response, PaginationParams};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::lab_orders::{
        CreateLabOrderRequest, PrescriptionRequest, UpdateLabOrderNotesRequest,
        UpdateLabOrderStatusRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LabOrderListQuery {
    /// Filter by workflow status
    pub status: Option<String>,
}

/// List lab orders, optionally by status
#[utoipa::path(
    get,
    path = "/api/lab-orders",
    security(("bearer_auth" = [])),
    params(LabOrderListQuery, PaginationParams),
    responses(
        (status = 200, description = "Lab orders returned", body = crate::services::lab_orders::LabOrderListResponse),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn list_lab_orders(
    State(state): State<AppState>,
    Query(query): Query<LabOrderListQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let lab_orders = state
        .services
        .lab_orders
        .list_lab_orders(
            query.status,
            pagination.page(),
            pagination.per_page(state.config.api_max_page_size as u64),
        )
        .await?;
    Ok(success_response(lab_orders))
}

/// Send a prescription to the lens lab
#[utoipa::path(
    post,
    path = "/api/lab-orders",
    security(("bearer_auth" = [])),
    request_body = CreateLabOrderRequest,
    responses(
        (status = 201, description = "Lab order created", body = crate::services::lab_orders::LabOrderResponse),
        (status = 404, description = "Unknown prescription", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn create_lab_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateLabOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lab_order = state.services.lab_orders.create_lab_order(payload).await?;
    Ok(created_response(lab_order))
}

/// Lab order detail
#[utoipa::path(
    get,
    path = "/api/lab-orders/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lab order ID")),
    responses(
        (status = 200, description = "Lab order returned", body = crate::services::lab_orders::LabOrderResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn get_lab_order(
    State(state): State<AppState>,
    Path(lab_order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let lab_order = state.services.lab_orders.get_lab_order(lab_order_id).await?;
    Ok(success_response(lab_order))
}

/// Advance a lab order through the workflow
#[utoipa::path(
    put,
    path = "/api/lab-orders/{id}/status",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lab order ID")),
    request_body = UpdateLabOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::services::lab_orders::LabOrderResponse),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn update_lab_order_status(
    State(state): State<AppState>,
    Path(lab_order_id): Path<Uuid>,
    Json(payload): Json<UpdateLabOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lab_order = state
        .services
        .lab_orders
        .update_status(lab_order_id, payload)
        .await?;
    Ok(success_response(lab_order))
}

/// Update workshop notes on a lab order
#[utoipa::path(
    put,
    path = "/api/lab-orders/{id}/notes",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Lab order ID")),
    request_body = UpdateLabOrderNotesRequest,
    responses(
        (status = 200, description = "Notes updated", body = crate::services::lab_orders::LabOrderResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn update_lab_order_notes(
    State(state): State<AppState>,
    Path(lab_order_id): Path<Uuid>,
    Json(payload): Json<UpdateLabOrderNotesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let lab_order = state
        .services
        .lab_orders
        .update_notes(lab_order_id, payload)
        .await?;
    Ok(success_response(lab_order))
}

/// Prescription detail
#[utoipa::path(
    get,
    path = "/api/lab-orders/prescriptions/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Prescription ID")),
    responses(
        (status = 200, description = "Prescription returned", body = crate::services::lab_orders::PrescriptionResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn get_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let prescription = state
        .services
        .lab_orders
        .get_prescription(prescription_id)
        .await?;
    Ok(success_response(prescription))
}

/// Replace the clinical fields of a prescription
#[utoipa::path(
    put,
    path = "/api/lab-orders/prescriptions/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Prescription ID")),
    request_body = PrescriptionRequest,
    responses(
        (status = 200, description = "Prescription updated", body = crate::services::lab_orders::PrescriptionResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "lab-orders"
)]
pub async fn update_prescription(
    State(state): State<AppState>,
    Path(prescription_id): Path<Uuid>,
    Json(payload): Json<PrescriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let prescription = state
        .services
        .lab_orders
        .update_prescription(prescription_id, payload)
        .await?;
    Ok(success_response(prescription))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/lab-orders", get(list_lab_orders))
        .route("/lab-orders", post(create_lab_order))
        .route(
            "/lab-orders/prescriptions/:id",
            get(get_prescription).put(update_prescription),
        )
        .route("/lab-orders/:id", get(get_lab_order))
        .route("/lab-orders/:id/status", put(update_lab_order_status))
        .route("/lab-orders/:id/notes", put(update_lab_order_notes))
}
