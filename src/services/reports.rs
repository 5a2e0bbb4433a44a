use crate::{
    db::DbPool,
    entities::inventory_movement::{self, Entity as MovementEntity},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    services::orders::OrderStatus,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Reporting window selector shared by the summary endpoints. Weeks start
/// on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPeriod {
    Day,
    Week,
    Month,
    Year,
}

impl ReportPeriod {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(ServiceError::ValidationError(format!(
                "Invalid period: {}. Expected day, week, month or year",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Start of the current period in UTC, relative to `now`.
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let start_date = match self {
            Self::Day => today,
            Self::Week => today - Duration::days(today.weekday().num_days_from_monday() as i64),
            Self::Month => today.with_day(1).unwrap_or(today),
            Self::Year => today.with_ordinal(1).unwrap_or(today),
        };
        start_of_day(start_date)
    }
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HourlySalesBucket {
    pub hour: u32,
    pub order_count: u64,
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailySalesReport {
    pub date: NaiveDate,
    pub order_count: u64,
    pub total_sales: Decimal,
    pub hourly: Vec<HourlySalesBucket>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailySalesBucket {
    pub day: u32,
    pub order_count: u64,
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MonthlySalesReport {
    pub year: i32,
    pub month: u32,
    pub order_count: u64,
    pub total_sales: Decimal,
    pub daily: Vec<DailySalesBucket>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SalesSummaryReport {
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub order_count: u64,
    pub total_sales: Decimal,
    pub average_order_value: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TopProductEntry {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementReportEntry {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_delta: i32,
    pub reason: String,
    pub reference: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MovementReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_in: i64,
    pub total_out: i64,
    pub net_change: i64,
    pub entries: Vec<MovementReportEntry>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LowStockEntry {
    pub product_id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub stock: i32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LowStockReport {
    pub threshold: i32,
    pub count: usize,
    pub products: Vec<LowStockEntry>,
}

/// Read-only reporting over orders and the inventory ledger.
///
/// Reports bucket in memory after a range-filtered fetch; the row counts
/// involved (one store's orders for a day or month) stay small.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
    low_stock_threshold: i32,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>, low_stock_threshold: i32) -> Self {
        Self {
            db_pool,
            low_stock_threshold,
        }
    }

    async fn completed_orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed.to_string()))
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch completed orders for report");
                ServiceError::DatabaseError(e)
            })
    }

    /// Completed sales for one calendar day, broken down by hour
    #[instrument(skip(self), fields(date = %date))]
    pub async fn daily_sales(&self, date: NaiveDate) -> Result<DailySalesReport, ServiceError> {
        let start = start_of_day(date);
        let end = start + Duration::days(1);
        let orders = self.completed_orders_between(start, end).await?;

        let mut hourly: Vec<HourlySalesBucket> = (0..24)
            .map(|hour| HourlySalesBucket {
                hour,
                order_count: 0,
                total_sales: Decimal::ZERO,
            })
            .collect();

        let mut total_sales = Decimal::ZERO;
        for order in &orders {
            let bucket = &mut hourly[order.created_at.hour() as usize];
            bucket.order_count += 1;
            bucket.total_sales += order.total_amount;
            total_sales += order.total_amount;
        }

        Ok(DailySalesReport {
            date,
            order_count: orders.len() as u64,
            total_sales,
            hourly,
        })
    }

    /// Completed sales for one calendar month, broken down by day
    #[instrument(skip(self))]
    pub async fn monthly_sales(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlySalesReport, ServiceError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            ServiceError::ValidationError(format!("Invalid year/month: {}-{}", year, month))
        })?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or(ServiceError::InternalServerError)?;

        let start = start_of_day(first);
        let end = start_of_day(next_month);
        let orders = self.completed_orders_between(start, end).await?;

        let days_in_month = (next_month - first).num_days() as u32;
        let mut daily: Vec<DailySalesBucket> = (1..=days_in_month)
            .map(|day| DailySalesBucket {
                day,
                order_count: 0,
                total_sales: Decimal::ZERO,
            })
            .collect();

        let mut total_sales = Decimal::ZERO;
        for order in &orders {
            let bucket = &mut daily[order.created_at.day() as usize - 1];
            bucket.order_count += 1;
            bucket.total_sales += order.total_amount;
            total_sales += order.total_amount;
        }

        Ok(MonthlySalesReport {
            year,
            month,
            order_count: orders.len() as u64,
            total_sales,
            daily,
        })
    }

    /// Totals for the current day, week, month or year
    #[instrument(skip(self))]
    pub async fn sales_summary(&self, period: &str) -> Result<SalesSummaryReport, ServiceError> {
        let period = ReportPeriod::parse(period)?;
        let now = Utc::now();
        let start = period.window_start(now);
        let orders = self.completed_orders_between(start, now).await?;

        let total_sales: Decimal = orders.iter().map(|o| o.total_amount).sum();
        let order_count = orders.len() as u64;
        let average_order_value = if order_count > 0 {
            total_sales / Decimal::from(order_count)
        } else {
            Decimal::ZERO
        };

        Ok(SalesSummaryReport {
            period: period.as_str().to_string(),
            start,
            end: now,
            order_count,
            total_sales,
            average_order_value,
        })
    }

    /// Best-selling products by units sold over a date range
    #[instrument(skip(self))]
    pub async fn top_products(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TopProductEntry>, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }

        let orders = self.completed_orders_between(start, end).await?;
        if orders.is_empty() {
            return Ok(Vec::new());
        }
        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch order items for top products report");
                ServiceError::DatabaseError(e)
            })?;

        // (units, revenue) per product
        let mut totals: HashMap<Uuid, (i64, Decimal)> = HashMap::new();
        for item in &items {
            let entry = totals.entry(item.product_id).or_insert((0, Decimal::ZERO));
            entry.0 += item.quantity as i64;
            entry.1 += item.price_at_time * Decimal::from(item.quantity);
        }

        let products = ProductEntity::find()
            .filter(product::Column::Id.is_in(totals.keys().copied().collect::<Vec<_>>()))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch products for top products report");
                ServiceError::DatabaseError(e)
            })?;

        let mut entries: Vec<TopProductEntry> = products
            .into_iter()
            .filter_map(|p| {
                totals.get(&p.id).map(|(units, revenue)| TopProductEntry {
                    product_id: p.id,
                    sku: p.sku,
                    name: p.name,
                    units_sold: *units,
                    revenue: *revenue,
                })
            })
            .collect();

        entries.sort_by(|a, b| b.units_sold.cmp(&a.units_sold));
        entries.truncate(limit);
        Ok(entries)
    }

    /// Inventory ledger entries over a date range, optionally per product
    #[instrument(skip(self))]
    pub async fn movement_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        product_id: Option<Uuid>,
    ) -> Result<MovementReport, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }

        let mut query = MovementEntity::find()
            .filter(inventory_movement::Column::CreatedAt.gte(start))
            .filter(inventory_movement::Column::CreatedAt.lt(end));
        if let Some(product_id) = product_id {
            query = query.filter(inventory_movement::Column::ProductId.eq(product_id));
        }

        let movements = query
            .order_by_desc(inventory_movement::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch inventory movements for report");
                ServiceError::DatabaseError(e)
            })?;

        let product_ids: Vec<Uuid> = movements.iter().map(|m| m.product_id).collect();
        let names: HashMap<Uuid, String> = ProductEntity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch products for movement report");
                ServiceError::DatabaseError(e)
            })?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        let mut total_in: i64 = 0;
        let mut total_out: i64 = 0;
        let entries: Vec<MovementReportEntry> = movements
            .into_iter()
            .map(|m| {
                if m.quantity_delta >= 0 {
                    total_in += m.quantity_delta as i64;
                } else {
                    total_out += (-m.quantity_delta) as i64;
                }
                MovementReportEntry {
                    id: m.id,
                    product_id: m.product_id,
                    product_name: names
                        .get(&m.product_id)
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                    quantity_delta: m.quantity_delta,
                    reason: m.reason,
                    reference: m.reference,
                    recorded_by: m.recorded_by,
                    created_at: m.created_at,
                }
            })
            .collect();

        Ok(MovementReport {
            start,
            end,
            total_in,
            total_out,
            net_change: total_in - total_out,
            entries,
        })
    }

    /// Products at or below the low-stock threshold
    #[instrument(skip(self))]
    pub async fn low_stock_report(
        &self,
        threshold: Option<i32>,
    ) -> Result<LowStockReport, ServiceError> {
        let threshold = threshold.unwrap_or(self.low_stock_threshold);
        if threshold < 0 {
            return Err(ServiceError::ValidationError(
                "Threshold must not be negative".to_string(),
            ));
        }

        let products = ProductEntity::find()
            .filter(product::Column::Stock.lte(threshold))
            .order_by_asc(product::Column::Stock)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch low-stock products");
                ServiceError::DatabaseError(e)
            })?;

        let entries: Vec<LowStockEntry> = products
            .into_iter()
            .map(|p| LowStockEntry {
                product_id: p.id,
                sku: p.sku,
                name: p.name,
                category: p.category,
                stock: p.stock,
            })
            .collect();

        Ok(LowStockReport {
            threshold,
            count: entries.len(),
            products: entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    #[test_case::test_case("day", ReportPeriod::Day)]
    #[test_case::test_case("week", ReportPeriod::Week)]
    #[test_case::test_case("month", ReportPeriod::Month)]
    #[test_case::test_case("year", ReportPeriod::Year)]
    fn period_parsing_accepts_the_four_windows(raw: &str, expected: ReportPeriod) {
        assert_eq!(ReportPeriod::parse(raw).unwrap(), expected);
    }

    #[test]
    fn period_parsing_rejects_anything_else() {
        assert!(matches!(
            ReportPeriod::parse("quarter"),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn week_window_starts_on_monday() {
        // 2024-06-13 is a Thursday
        let now = Utc.with_ymd_and_hms(2024, 6, 13, 15, 30, 0).unwrap();
        let start = ReportPeriod::Week.window_start(now);
        assert_eq!(
            start,
            Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn month_and_year_windows_start_on_the_first() {
        let now = Utc.with_ymd_and_hms(2024, 6, 13, 15, 30, 0).unwrap();
        assert_eq!(
            ReportPeriod::Month.window_start(now),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            ReportPeriod::Year.window_start(now),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn day_window_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 6, 13, 15, 30, 0).unwrap();
        assert_eq!(
            ReportPeriod::Day.window_start(now),
            Utc.with_ymd_and_hms(2024, 6, 13, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn monthly_sales_rejects_month_thirteen() {
        let service = ReportService::new(Arc::new(DatabaseConnection::Disconnected), 10);
        let err = service.monthly_sales(2024, 13).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn summary_rejects_unknown_period() {
        let service = ReportService::new(Arc::new(DatabaseConnection::Disconnected), 10);
        let err = service.sales_summary("fortnight").await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn top_products_rejects_inverted_range() {
        let service = ReportService::new(Arc::new(DatabaseConnection::Disconnected), 10);
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let err = service.top_products(start, end, 10).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn low_stock_rejects_negative_threshold() {
        let service = ReportService::new(Arc::new(DatabaseConnection::Disconnected), 10);
        let err = service.low_stock_report(Some(-1)).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
