use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::AppState,
    services::inventory::{
        AdjustStockRequest, CreateProductRequest, ProductFilter, UpdateProductRequest,
    },
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LowStockQuery {
    /// Override the configured low-stock threshold
    pub threshold: Option<i32>,
}

/// Stock listing with category/search filters
#[utoipa::path(
    get,
    path = "/api/inventory",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Products returned", body = crate::services::inventory::ProductListResponse)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .inventory
        .list_products(
            filter,
            pagination.page(),
            pagination.per_page(state.config.api_max_page_size as u64),
        )
        .await?;
    Ok(success_response(products))
}

/// Products at or below the low-stock threshold
#[utoipa::path(
    get,
    path = "/api/inventory/low-stock",
    security(("bearer_auth" = [])),
    params(LowStockQuery),
    responses(
        (status = 200, description = "Low-stock products returned", body = [crate::services::inventory::ProductResponse])
    ),
    tag = "inventory"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .inventory
        .list_low_stock(query.threshold)
        .await?;
    Ok(success_response(products))
}

/// Aggregate stock statistics
#[utoipa::path(
    get,
    path = "/api/inventory/stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stats returned", body = crate::services::inventory::InventoryStatsResponse)
    ),
    tag = "inventory"
)]
pub async fn inventory_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.services.inventory.stats().await?;
    Ok(success_response(stats))
}

/// Add a product to the catalog
#[utoipa::path(
    post,
    path = "/api/inventory",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = crate::services::inventory::ProductResponse),
        (status = 400, description = "Invalid request or duplicate SKU", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_product(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .inventory
        .create_product(payload, current_user.user_id)
        .await?;
    Ok(created_response(product))
}

/// Update product metadata. Stock only changes through adjustments.
#[utoipa::path(
    put,
    path = "/api/inventory/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = crate::services::inventory::ProductResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .inventory
        .update_product(product_id, payload)
        .await?;
    Ok(success_response(product))
}

/// Adjust stock; writes a ledger entry alongside the new level
#[utoipa::path(
    patch,
    path = "/api/inventory/{id}/stock",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = crate::services::inventory::StockAdjustmentResponse),
        (status = 400, description = "Invalid adjustment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let adjustment = state
        .services
        .inventory
        .adjust_stock(product_id, payload, current_user.user_id)
        .await?;
    Ok(success_response(adjustment))
}

/// Remove a product that was never sold
#[utoipa::path(
    delete,
    path = "/api/inventory/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, description = "Product has sales history", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.inventory.delete_product(product_id).await?;
    Ok(no_content_response())
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/inventory", get(list_inventory))
        .route("/inventory", post(create_product))
        .route("/inventory/low-stock", get(list_low_stock))
        .route("/inventory/stats", get(inventory_stats))
        .route("/inventory/:id", put(update_product))
        .route("/inventory/:id", delete(delete_product))
        .route("/inventory/:id/stock", patch(adjust_stock))
}
