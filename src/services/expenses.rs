use crate::{
    db::DbPool,
    entities::expense::{self, Entity as ExpenseEntity, Model as ExpenseModel},
    errors::ServiceError,
    services::reports::ReportPeriod,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Fixed set of expense categories; rows never carry anything outside it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Salaries,
    Supplies,
    Equipment,
    Maintenance,
    Marketing,
    Insurance,
    Taxes,
    Other,
}

impl ExpenseCategory {
    pub fn all() -> Vec<String> {
        Self::iter().map(|c| c.to_string()).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    pub amount: Decimal,
    /// Defaults to now when omitted.
    pub date: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateExpenseRequest {
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ExpenseFilter {
    pub category: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseResponse {
    pub id: Uuid,
    pub category: String,
    pub amount: Decimal,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub recorded_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ExpenseModel> for ExpenseResponse {
    fn from(model: ExpenseModel) -> Self {
        Self {
            id: model.id,
            category: model.category,
            amount: model.amount,
            date: model.date,
            description: model.description,
            recorded_by: model.recorded_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseListResponse {
    pub expenses: Vec<ExpenseResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryTotal {
    pub category: String,
    pub count: u64,
    pub total: Decimal,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExpenseSummary {
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub expense_count: u64,
    pub total: Decimal,
    pub by_category: Vec<CategoryTotal>,
}

/// Operating expense bookkeeping. All operations are admin-gated at the
/// route layer.
#[derive(Clone)]
pub struct ExpenseService {
    db_pool: Arc<DbPool>,
}

impl ExpenseService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    fn parse_category(raw: &str) -> Result<ExpenseCategory, ServiceError> {
        raw.parse().map_err(|_| {
            ServiceError::ValidationError(format!(
                "Unknown category: {}. Expected one of: {}",
                raw,
                ExpenseCategory::all().join(", ")
            ))
        })
    }

    /// Records a new expense
    #[instrument(skip(self, request), fields(category = %request.category, recorded_by = %recorded_by))]
    pub async fn create_expense(
        &self,
        request: CreateExpenseRequest,
        recorded_by: Uuid,
    ) -> Result<ExpenseResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let category = Self::parse_category(&request.category)?;
        if request.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Amount must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let model = expense::ActiveModel {
            id: Set(Uuid::new_v4()),
            category: Set(category.to_string()),
            amount: Set(request.amount),
            date: Set(request.date.unwrap_or(now)),
            description: Set(request.description),
            recorded_by: Set(recorded_by),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create expense");
            ServiceError::DatabaseError(e)
        })?;

        info!(expense_id = %model.id, category = %category, amount = %model.amount, "Expense recorded");
        Ok(ExpenseResponse::from(model))
    }

    /// Lists expenses with category/date filters
    #[instrument(skip(self, filter))]
    pub async fn list_expenses(
        &self,
        filter: ExpenseFilter,
        page: u64,
        per_page: u64,
    ) -> Result<ExpenseListResponse, ServiceError> {
        let mut query = ExpenseEntity::find();
        if let Some(raw) = filter.category {
            let category = Self::parse_category(&raw)?;
            query = query.filter(expense::Column::Category.eq(category.to_string()));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(expense::Column::Date.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(expense::Column::Date.lt(to));
        }

        let paginator = query
            .order_by_desc(expense::Column::Date)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count expenses");
            ServiceError::DatabaseError(e)
        })?;

        let expenses = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, "Failed to fetch expenses page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(ExpenseListResponse {
            expenses: expenses.into_iter().map(ExpenseResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self), fields(expense_id = %expense_id))]
    pub async fn get_expense(&self, expense_id: Uuid) -> Result<ExpenseResponse, ServiceError> {
        let model = self.find_expense(expense_id).await?;
        Ok(ExpenseResponse::from(model))
    }

    async fn find_expense(&self, expense_id: Uuid) -> Result<ExpenseModel, ServiceError> {
        ExpenseEntity::find_by_id(expense_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, expense_id = %expense_id, "Failed to fetch expense");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Expense {} not found", expense_id)))
    }

    /// Updates an expense record
    #[instrument(skip(self, request), fields(expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        expense_id: Uuid,
        request: UpdateExpenseRequest,
    ) -> Result<ExpenseResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let model = self.find_expense(expense_id).await?;
        let mut active: expense::ActiveModel = model.into();

        if let Some(raw) = request.category {
            let category = Self::parse_category(&raw)?;
            active.category = Set(category.to_string());
        }
        if let Some(amount) = request.amount {
            if amount <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Amount must be positive".to_string(),
                ));
            }
            active.amount = Set(amount);
        }
        if let Some(date) = request.date {
            active.date = Set(date);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, expense_id = %expense_id, "Failed to update expense");
            ServiceError::DatabaseError(e)
        })?;

        info!(expense_id = %expense_id, "Expense updated");
        Ok(ExpenseResponse::from(updated))
    }

    /// Deletes an expense record
    #[instrument(skip(self), fields(expense_id = %expense_id))]
    pub async fn delete_expense(&self, expense_id: Uuid) -> Result<(), ServiceError> {
        let model = self.find_expense(expense_id).await?;
        model.delete(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, expense_id = %expense_id, "Failed to delete expense");
            ServiceError::DatabaseError(e)
        })?;

        info!(expense_id = %expense_id, "Expense deleted");
        Ok(())
    }

    /// Totals for the current period, broken down by category. Defaults to
    /// the current month.
    #[instrument(skip(self))]
    pub async fn summary(&self, period: Option<&str>) -> Result<ExpenseSummary, ServiceError> {
        let period = ReportPeriod::parse(period.unwrap_or("month"))?;
        let now = Utc::now();
        let start = period.window_start(now);

        let expenses = ExpenseEntity::find()
            .filter(expense::Column::Date.gte(start))
            .filter(expense::Column::Date.lt(now))
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch expenses for summary");
                ServiceError::DatabaseError(e)
            })?;

        // (count, total) per category
        let mut per_category: HashMap<String, (u64, Decimal)> = HashMap::new();
        let mut total = Decimal::ZERO;
        for e in &expenses {
            let entry = per_category
                .entry(e.category.clone())
                .or_insert((0, Decimal::ZERO));
            entry.0 += 1;
            entry.1 += e.amount;
            total += e.amount;
        }

        // Every category appears in the breakdown, zero or not.
        let by_category: Vec<CategoryTotal> = ExpenseCategory::iter()
            .map(|c| {
                let name = c.to_string();
                let (count, total) = per_category.get(&name).copied().unwrap_or((0, Decimal::ZERO));
                CategoryTotal {
                    category: name,
                    count,
                    total,
                }
            })
            .collect();

        Ok(ExpenseSummary {
            period: period.as_str().to_string(),
            start,
            end: now,
            expense_count: expenses.len() as u64,
            total,
            by_category,
        })
    }

    /// The fixed list of valid categories
    pub fn categories(&self) -> Vec<String> {
        ExpenseCategory::all()
    }
}
