use crate::{
    db::DbPool,
    entities::commission_rule::{self, Entity as RuleEntity, Model as RuleModel},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::user::{self, Entity as UserEntity, Model as UserModel},
    errors::ServiceError,
    services::orders::OrderStatus,
    services::reports::ReportPeriod,
    services::users::UserRole,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertRuleRequest {
    /// Fraction of sales paid as commission, e.g. 0.05 for 5%.
    pub rate: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommissionRuleResponse {
    pub id: Uuid,
    pub role: String,
    pub rate: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<RuleModel> for CommissionRuleResponse {
    fn from(model: RuleModel) -> Self {
        Self {
            id: model.id,
            role: model.role,
            rate: model.rate,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserCommission {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub role: String,
    pub rate: Decimal,
    pub order_count: u64,
    pub total_sales: Decimal,
    pub commission: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommissionReport {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sellers: Vec<UserCommission>,
    pub total_sales: Decimal,
    pub total_commission: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommissionSummary {
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub seller_count: usize,
    pub total_sales: Decimal,
    pub total_commission: Decimal,
}

/// Commission calculation over completed orders.
///
/// The effective rate for a seller resolves in order: the per-user override
/// on the account, then the rule for the seller's role, then the configured
/// store default.
#[derive(Clone)]
pub struct CommissionService {
    db_pool: Arc<DbPool>,
    default_rate: Decimal,
}

impl CommissionService {
    pub fn new(db_pool: Arc<DbPool>, default_rate: Decimal) -> Self {
        Self {
            db_pool,
            default_rate,
        }
    }

    fn effective_rate(
        &self,
        user: &UserModel,
        role_rates: &HashMap<String, Decimal>,
    ) -> Decimal {
        user.commission_rate
            .or_else(|| role_rates.get(&user.role).copied())
            .unwrap_or(self.default_rate)
    }

    async fn role_rates(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        let rules = RuleEntity::find().all(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to fetch commission rules");
            ServiceError::DatabaseError(e)
        })?;
        Ok(rules.into_iter().map(|r| (r.role, r.rate)).collect())
    }

    async fn completed_orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<OrderModel>, ServiceError> {
        let mut query = OrderEntity::find()
            .filter(order::Column::Status.eq(OrderStatus::Completed.to_string()))
            .filter(order::Column::CreatedAt.gte(start))
            .filter(order::Column::CreatedAt.lt(end));
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        query.all(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to fetch completed orders for commissions");
            ServiceError::DatabaseError(e)
        })
    }

    async fn build_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: Option<Uuid>,
    ) -> Result<CommissionReport, ServiceError> {
        let orders = self.completed_orders_between(start, end, user_id).await?;

        // (order_count, sales) per seller
        let mut per_seller: HashMap<Uuid, (u64, Decimal)> = HashMap::new();
        for order in &orders {
            let entry = per_seller.entry(order.user_id).or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += order.total_amount;
        }

        // A single requested seller appears in the report even with no sales.
        if let Some(user_id) = user_id {
            per_seller.entry(user_id).or_insert((0, Decimal::ZERO));
        }

        let users = UserEntity::find()
            .filter(user::Column::Id.is_in(per_seller.keys().copied().collect::<Vec<_>>()))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch sellers for commission report");
                ServiceError::DatabaseError(e)
            })?;

        if let Some(user_id) = user_id {
            if users.is_empty() {
                return Err(ServiceError::NotFound(format!(
                    "User {} not found",
                    user_id
                )));
            }
        }

        let role_rates = self.role_rates().await?;

        let mut sellers: Vec<UserCommission> = users
            .into_iter()
            .map(|u| {
                let (order_count, total_sales) =
                    per_seller.get(&u.id).copied().unwrap_or((0, Decimal::ZERO));
                let rate = self.effective_rate(&u, &role_rates);
                UserCommission {
                    user_id: u.id,
                    username: u.username,
                    full_name: u.full_name,
                    role: u.role,
                    rate,
                    order_count,
                    total_sales,
                    commission: total_sales * rate,
                }
            })
            .collect();
        sellers.sort_by(|a, b| b.total_sales.cmp(&a.total_sales));

        let total_sales: Decimal = sellers.iter().map(|s| s.total_sales).sum();
        let total_commission: Decimal = sellers.iter().map(|s| s.commission).sum();

        Ok(CommissionReport {
            start,
            end,
            sellers,
            total_sales,
            total_commission,
        })
    }

    /// Per-seller commissions over a date range. Pass a user id to narrow
    /// the report to one seller.
    #[instrument(skip(self))]
    pub async fn calculate(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: Option<Uuid>,
    ) -> Result<CommissionReport, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }
        self.build_report(start, end, user_id).await
    }

    /// Store-wide commission totals for the current period
    #[instrument(skip(self))]
    pub async fn summary(&self, period: &str) -> Result<CommissionSummary, ServiceError> {
        let period = ReportPeriod::parse(period)?;
        let now = Utc::now();
        let start = period.window_start(now);
        let report = self.build_report(start, now, None).await?;

        Ok(CommissionSummary {
            period: period.as_str().to_string(),
            start,
            end: now,
            seller_count: report.sellers.len(),
            total_sales: report.total_sales,
            total_commission: report.total_commission,
        })
    }

    /// Sellers ranked by sales over a date range
    #[instrument(skip(self))]
    pub async fn top_performers(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<UserCommission>, ServiceError> {
        if end <= start {
            return Err(ServiceError::ValidationError(
                "End date must be after start date".to_string(),
            ));
        }
        let mut report = self.build_report(start, end, None).await?;
        report.sellers.truncate(limit);
        Ok(report.sellers)
    }

    /// All configured role rules
    #[instrument(skip(self))]
    pub async fn list_rules(&self) -> Result<Vec<CommissionRuleResponse>, ServiceError> {
        let rules = RuleEntity::find()
            .order_by_asc(commission_rule::Column::Role)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list commission rules");
                ServiceError::DatabaseError(e)
            })?;
        Ok(rules.into_iter().map(CommissionRuleResponse::from).collect())
    }

    /// Creates or replaces the rule for a role
    #[instrument(skip(self, request), fields(role = %role, rate = %request.rate))]
    pub async fn upsert_rule(
        &self,
        role: &str,
        request: UpsertRuleRequest,
    ) -> Result<CommissionRuleResponse, ServiceError> {
        let parsed_role: UserRole = role
            .parse()
            .map_err(|_| ServiceError::ValidationError(format!("Unknown role: {}", role)))?;

        if request.rate < Decimal::ZERO || request.rate > Decimal::ONE {
            return Err(ServiceError::ValidationError(
                "Rate must be between 0 and 1".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let now = Utc::now();

        let existing = RuleEntity::find()
            .filter(commission_rule::Column::Role.eq(parsed_role.to_string()))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, role = %parsed_role, "Failed to look up commission rule");
                ServiceError::DatabaseError(e)
            })?;

        let model = match existing {
            Some(rule) => {
                let mut active: commission_rule::ActiveModel = rule.into();
                active.rate = Set(request.rate);
                active.updated_at = Set(Some(now));
                active.update(db).await.map_err(|e| {
                    error!(error = %e, role = %parsed_role, "Failed to update commission rule");
                    ServiceError::DatabaseError(e)
                })?
            }
            None => commission_rule::ActiveModel {
                id: Set(Uuid::new_v4()),
                role: Set(parsed_role.to_string()),
                rate: Set(request.rate),
                created_at: Set(now),
                updated_at: Set(None),
            }
            .insert(db)
            .await
            .map_err(|e| {
                error!(error = %e, role = %parsed_role, "Failed to create commission rule");
                ServiceError::DatabaseError(e)
            })?,
        };

        info!(role = %parsed_role, rate = %request.rate, "Commission rule saved");
        Ok(CommissionRuleResponse::from(model))
    }

    /// Deletes the rule for a role; sellers fall back to the store default
    #[instrument(skip(self), fields(role = %role))]
    pub async fn delete_rule(&self, role: &str) -> Result<(), ServiceError> {
        let parsed_role: UserRole = role
            .parse()
            .map_err(|_| ServiceError::ValidationError(format!("Unknown role: {}", role)))?;

        let result = RuleEntity::delete_many()
            .filter(commission_rule::Column::Role.eq(parsed_role.to_string()))
            .exec(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, role = %parsed_role, "Failed to delete commission rule");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(role = %parsed_role, "No commission rule to delete");
            return Err(ServiceError::NotFound(format!(
                "No commission rule for role {}",
                parsed_role
            )));
        }

        info!(role = %parsed_role, "Commission rule deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sea_orm::DatabaseConnection;

    fn seller(rate: Option<Decimal>, role: &str) -> UserModel {
        UserModel {
            id: Uuid::new_v4(),
            email: "seller@optica.test".to_string(),
            username: "seller".to_string(),
            full_name: "Test Seller".to_string(),
            hashed_password: "hash".to_string(),
            role: role.to_string(),
            is_active: true,
            is_admin: false,
            commission_rate: rate,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn service() -> CommissionService {
        CommissionService::new(Arc::new(DatabaseConnection::Disconnected), dec!(0.05))
    }

    #[test]
    fn user_override_beats_role_rule() {
        let service = service();
        let mut role_rates = HashMap::new();
        role_rates.insert("cashier".to_string(), dec!(0.08));

        let user = seller(Some(dec!(0.12)), "cashier");
        assert_eq!(service.effective_rate(&user, &role_rates), dec!(0.12));
    }

    #[test]
    fn role_rule_beats_store_default() {
        let service = service();
        let mut role_rates = HashMap::new();
        role_rates.insert("manager".to_string(), dec!(0.08));

        let user = seller(None, "manager");
        assert_eq!(service.effective_rate(&user, &role_rates), dec!(0.08));
    }

    #[test]
    fn store_default_applies_without_override_or_rule() {
        let service = service();
        let user = seller(None, "optometrist");
        assert_eq!(service.effective_rate(&user, &HashMap::new()), dec!(0.05));
    }

    #[tokio::test]
    async fn calculate_rejects_inverted_range() {
        let start = Utc::now();
        let end = start - chrono::Duration::days(1);
        let err = service().calculate(start, end, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_rate_above_one() {
        let err = service()
            .upsert_rule("cashier", UpsertRuleRequest { rate: dec!(1.5) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_unknown_role() {
        let err = service()
            .upsert_rule("janitor", UpsertRuleRequest { rate: dec!(0.05) })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
