use super::common::{created_response, no_content_response, success_response, PaginationParams};
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::AppState,
    services::expenses::{CreateExpenseRequest, ExpenseFilter, UpdateExpenseRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpenseSummaryQuery {
    /// One of day, week, month, year; defaults to month
    pub period: Option<String>,
}

/// Record an operating expense
#[utoipa::path(
    post,
    path = "/api/expenses",
    security(("bearer_auth" = [])),
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Expense recorded", body = crate::services::expenses::ExpenseResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn create_expense(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Json(payload): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state
        .services
        .expenses
        .create_expense(payload, current_user.user_id)
        .await?;
    Ok(created_response(expense))
}

/// List expenses with category/date filters
#[utoipa::path(
    get,
    path = "/api/expenses",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "Expenses returned", body = crate::services::expenses::ExpenseListResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn list_expenses(
    State(state): State<AppState>,
    Query(filter): Query<ExpenseFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let expenses = state
        .services
        .expenses
        .list_expenses(
            filter,
            pagination.page(),
            pagination.per_page(state.config.api_max_page_size as u64),
        )
        .await?;
    Ok(success_response(expenses))
}

/// Expense totals by category for the current period
#[utoipa::path(
    get,
    path = "/api/expenses/summary",
    security(("bearer_auth" = [])),
    params(ExpenseSummaryQuery),
    responses(
        (status = 200, description = "Summary returned", body = crate::services::expenses::ExpenseSummary),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn expense_summary(
    State(state): State<AppState>,
    Query(query): Query<ExpenseSummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .services
        .expenses
        .summary(query.period.as_deref())
        .await?;
    Ok(success_response(summary))
}

/// The fixed list of valid categories
#[utoipa::path(
    get,
    path = "/api/expenses/categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Categories returned", body = [String])
    ),
    tag = "expenses"
)]
pub async fn list_categories(State(state): State<AppState>) -> impl IntoResponse {
    success_response(state.services.expenses.categories())
}

/// Expense detail
#[utoipa::path(
    get,
    path = "/api/expenses/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense returned", body = crate::services::expenses::ExpenseResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn get_expense(
    State(state): State<AppState>,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state.services.expenses.get_expense(expense_id).await?;
    Ok(success_response(expense))
}

/// Update an expense record
#[utoipa::path(
    put,
    path = "/api/expenses/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Expense updated", body = crate::services::expenses::ExpenseResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn update_expense(
    State(state): State<AppState>,
    Path(expense_id): Path<Uuid>,
    Json(payload): Json<UpdateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let expense = state
        .services
        .expenses
        .update_expense(expense_id, payload)
        .await?;
    Ok(success_response(expense))
}

/// Delete an expense record
#[utoipa::path(
    delete,
    path = "/api/expenses/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 204, description = "Expense deleted"),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    tag = "expenses"
)]
pub async fn delete_expense(
    State(state): State<AppState>,
    Path(expense_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.expenses.delete_expense(expense_id).await?;
    Ok(no_content_response())
}

/// All expense routes are administrator-only
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/expenses", post(create_expense))
        .route("/expenses", get(list_expenses))
        .route("/expenses/summary", get(expense_summary))
        .route("/expenses/categories", get(list_categories))
        .route("/expenses/:id", get(get_expense))
        .route("/expenses/:id", put(update_expense))
        .route("/expenses/:id", delete(delete_expense))
}
