use super::common::success_response;
use crate::{
    auth::AuthenticatedUser,
    errors::ApiError,
    handlers::AppState,
    services::commissions::UpsertRuleRequest,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct CalculateQuery {
    /// Start of the range; defaults to 30 days ago
    pub start_date: Option<DateTime<Utc>>,
    /// End of the range; defaults to now
    pub end_date: Option<DateTime<Utc>>,
    /// Seller to report on; non-admins always get their own figures
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// One of day, week, month, year; defaults to month
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopPerformersQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Number of sellers to return; defaults to 5
    pub limit: Option<usize>,
}

fn resolve_range(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let end = end.unwrap_or_else(Utc::now);
    let start = start.unwrap_or(end - Duration::days(30));
    (start, end)
}

/// Commission figures per seller over a date range. Non-admin callers only
/// ever see their own numbers.
#[utoipa::path(
    get,
    path = "/api/commissions/calculate",
    security(("bearer_auth" = [])),
    params(CalculateQuery),
    responses(
        (status = 200, description = "Report returned", body = crate::services::commissions::CommissionReport),
        (status = 400, description = "Invalid range", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn calculate(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Query(query): Query<CalculateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (start, end) = resolve_range(query.start_date, query.end_date);
    let user_id = if current_user.is_admin {
        query.user_id
    } else {
        Some(current_user.user_id)
    };
    let report = state
        .services
        .commissions
        .calculate(start, end, user_id)
        .await?;
    Ok(success_response(report))
}

/// Store-wide commission totals for the current period
#[utoipa::path(
    get,
    path = "/api/commissions/summary",
    security(("bearer_auth" = [])),
    params(SummaryQuery),
    responses(
        (status = 200, description = "Summary returned", body = crate::services::commissions::CommissionSummary),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = query.period.as_deref().unwrap_or("month");
    let report = state.services.commissions.summary(period).await?;
    Ok(success_response(report))
}

/// Sellers ranked by sales
#[utoipa::path(
    get,
    path = "/api/commissions/top-performers",
    security(("bearer_auth" = [])),
    params(TopPerformersQuery),
    responses(
        (status = 200, description = "Ranking returned", body = [crate::services::commissions::UserCommission]),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn top_performers(
    State(state): State<AppState>,
    Query(query): Query<TopPerformersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (start, end) = resolve_range(query.start_date, query.end_date);
    let ranking = state
        .services
        .commissions
        .top_performers(start, end, query.limit.unwrap_or(5))
        .await?;
    Ok(success_response(ranking))
}

/// All configured role rules
#[utoipa::path(
    get,
    path = "/api/commissions/rules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Rules returned", body = [crate::services::commissions::CommissionRuleResponse])
    ),
    tag = "commissions"
)]
pub async fn list_rules(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rules = state.services.commissions.list_rules().await?;
    Ok(success_response(rules))
}

/// Create or replace the commission rule for a role
#[utoipa::path(
    put,
    path = "/api/commissions/rules/{role}",
    security(("bearer_auth" = [])),
    params(("role" = String, Path, description = "Staff role")),
    request_body = UpsertRuleRequest,
    responses(
        (status = 200, description = "Rule saved", body = crate::services::commissions::CommissionRuleResponse),
        (status = 400, description = "Unknown role or invalid rate", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn upsert_rule(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Json(payload): Json<UpsertRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rule = state.services.commissions.upsert_rule(&role, payload).await?;
    Ok(success_response(rule))
}

/// Delete the commission rule for a role
#[utoipa::path(
    delete,
    path = "/api/commissions/rules/{role}",
    security(("bearer_auth" = [])),
    params(("role" = String, Path, description = "Staff role")),
    responses(
        (status = 200, description = "Rule deleted"),
        (status = 404, description = "No rule for role", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.commissions.delete_rule(&role).await?;
    Ok(success_response(serde_json::json!({ "deleted": role })))
}

/// Routes for any authenticated user
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/commissions/calculate", get(calculate))
        .route("/commissions/summary", get(summary))
        .route("/commissions/rules", get(list_rules))
}

/// Administrator-only routes
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/commissions/top-performers", get(top_performers))
        .route("/commissions/rules/:role", put(upsert_rule))
        .route("/commissions/rules/:role", delete(delete_rule))
}
