use super::common::{created_response, success_response, PaginationParams};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::AppState,
    services::inventory::{CreateProductRequest, ProductFilter},
    services::orders::{CreateOrderRequest, OrderFilter, UpdateOrderStatusRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

/// Catalog listing for the register screen
#[utoipa::path(
    get,
    path = "/api/pos/products",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Products returned", body = crate::services::inventory::ProductListResponse)
    ),
    tag = "pos"
)]
pub async fn list_products(
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

/// Product detail
#[utoipa::path(
    get,
    path = "/api/pos/products/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product returned", body = crate::services::inventory::ProductResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "pos"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.inventory.get_product(product_id).await?;
    Ok(success_response(product))
}

/// Add a product from the register screen
#[utoipa::path(
    post,
    path = "/api/pos/products",
    security(("bearer_auth" = [])),
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = crate::services::inventory::ProductResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "pos"
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

/// Ring up a sale. Stock is checked and decremented per line; any failure
/// rolls the whole order back.
#[utoipa::path(
    post,
    path = "/api/pos/orders",
    security(("bearer_auth" = [])),
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Invalid request or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse)
    ),
    tag = "pos"
)]
pub async fn create_order(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .create_order(current_user.user_id, payload)
        .await?;
    Ok(created_response(order))
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/pos/orders",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Orders returned", body = crate::services::orders::OrderListResponse)
    ),
    tag = "pos"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(
            filter,
            pagination.page(),
            pagination.per_page(state.config.api_max_page_size as u64),
        )
        .await?;
    Ok(success_response(orders))
}

/// Order detail with lines and prescription
#[utoipa::path(
    get,
    path = "/api/pos/orders/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order returned", body = crate::services::orders::OrderResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "pos"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.orders.get_order(order_id).await?;
    Ok(success_response(order))
}

/// Complete or cancel an order
#[utoipa::path(
    put,
    path = "/api/pos/orders/{id}/status",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::services::orders::OrderResponse),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "pos"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_status(order_id, payload, current_user.user_id)
        .await?;
    Ok(success_response(order))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pos/products", get(list_products))
        .route("/pos/products", post(create_product))
        .route("/pos/products/:id", get(get_product))
        .route("/pos/orders", post(create_order))
        .route("/pos/orders", get(list_orders))
        .route("/pos/orders/:id", get(get_order))
        .route("/pos/orders/:id/status", put(update_order_status))
}
