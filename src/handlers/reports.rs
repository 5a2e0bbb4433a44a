use super::common::success_response;
use crate::{errors::ApiError, handlers::AppState};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DailyReportQuery {
    /// Calendar day to report on; defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MonthlyReportQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct SummaryQuery {
    /// One of day, week, month, year; defaults to day
    pub period: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DateRangeQuery {
    /// Start of the range; defaults to 30 days ago
    pub start_date: Option<DateTime<Utc>>,
    /// End of the range; defaults to now
    pub end_date: Option<DateTime<Utc>>,
}

impl DateRangeQuery {
    fn resolve(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = self.end_date.unwrap_or_else(Utc::now);
        let start = self.start_date.unwrap_or(end - Duration::days(30));
        (start, end)
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopProductsQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Number of products to return; defaults to 10
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct MovementReportQuery {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Narrow the report to one product
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LowStockReportQuery {
    pub threshold: Option<i32>,
}

/// Completed sales for one day with an hourly breakdown
#[utoipa::path(
    get,
    path = "/api/reports/sales/daily",
    security(("bearer_auth" = [])),
    params(DailyReportQuery),
    responses(
        (status = 200, description = "Report returned", body = crate::services::reports::DailySalesReport)
    ),
    tag = "reports"
)]
pub async fn daily_sales(
    State(state): State<AppState>,
    Query(query): Query<DailyReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());
    let report = state.services.reports.daily_sales(date).await?;
    Ok(success_response(report))
}

/// Completed sales for one month with a daily breakdown
#[utoipa::path(
    get,
    path = "/api/reports/sales/monthly",
    security(("bearer_auth" = [])),
    params(MonthlyReportQuery),
    responses(
        (status = 200, description = "Report returned", body = crate::services::reports::MonthlySalesReport),
        (status = 400, description = "Invalid year/month", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn monthly_sales(
    State(state): State<AppState>,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .monthly_sales(query.year, query.month)
        .await?;
    Ok(success_response(report))
}

/// Sales totals for the current day, week, month or year
#[utoipa::path(
    get,
    path = "/api/reports/sales/summary",
    security(("bearer_auth" = [])),
    params(SummaryQuery),
    responses(
        (status = 200, description = "Summary returned", body = crate::services::reports::SalesSummaryReport),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    tag = "reports"
)]
pub async fn sales_summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = query.period.as_deref().unwrap_or("day");
    let report = state.services.reports.sales_summary(period).await?;
    Ok(success_response(report))
}

/// Best-selling products over a date range
#[utoipa::path(
    get,
    path = "/api/reports/sales/top-products",
    security(("bearer_auth" = [])),
    params(TopProductsQuery),
    responses(
        (status = 200, description = "Ranking returned", body = [crate::services::reports::TopProductEntry])
    ),
    tag = "reports"
)]
pub async fn top_products(
    State(state): State<AppState>,
    Query(query): Query<TopProductsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = DateRangeQuery {
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let (start, end) = range.resolve();
    let report = state
        .services
        .reports
        .top_products(start, end, query.limit.unwrap_or(10))
        .await?;
    Ok(success_response(report))
}

/// Inventory ledger over a date range
#[utoipa::path(
    get,
    path = "/api/reports/inventory/movement",
    security(("bearer_auth" = [])),
    params(MovementReportQuery),
    responses(
        (status = 200, description = "Report returned", body = crate::services::reports::MovementReport)
    ),
    tag = "reports"
)]
pub async fn movement_report(
    State(state): State<AppState>,
    Query(query): Query<MovementReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = DateRangeQuery {
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let (start, end) = range.resolve();
    let report = state
        .services
        .reports
        .movement_report(start, end, query.product_id)
        .await?;
    Ok(success_response(report))
}

/// Low-stock snapshot for restocking decisions
#[utoipa::path(
    get,
    path = "/api/reports/inventory/low-stock",
    security(("bearer_auth" = [])),
    params(LowStockReportQuery),
    responses(
        (status = 200, description = "Report returned", body = crate::services::reports::LowStockReport)
    ),
    tag = "reports"
)]
pub async fn low_stock_report(
    State(state): State<AppState>,
    Query(query): Query<LowStockReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .services
        .reports
        .low_stock_report(query.threshold)
        .await?;
    Ok(success_response(report))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/sales/daily", get(daily_sales))
        .route("/reports/sales/monthly", get(monthly_sales))
        .route("/reports/sales/summary", get(sales_summary))
        .route("/reports/sales/top-products", get(top_products))
        .route("/reports/inventory/movement", get(movement_report))
        .route("/reports/inventory/low-stock", get(low_stock_report))
}
