pub mod commissions;
pub mod common;
pub mod expenses;
pub mod health;
pub mod inventory;
pub mod lab_orders;
pub mod pos;
pub mod reports;
pub mod users;

use crate::{auth::AuthService, config::AppConfig, db::DbPool};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<crate::services::users::UserService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub inventory: Arc<crate::services::inventory::InventoryService>,
    pub lab_orders: Arc<crate::services::lab_orders::LabOrderService>,
    pub reports: Arc<crate::services::reports::ReportService>,
    pub commissions: Arc<crate::services::commissions::CommissionService>,
    pub expenses: Arc<crate::services::expenses::ExpenseService>,
}

impl AppServices {
    /// Wires every domain service against the shared connection pool
    pub fn new(db_pool: Arc<DbPool>, auth_service: Arc<AuthService>, config: &AppConfig) -> Self {
        Self {
            users: Arc::new(crate::services::users::UserService::new(
                db_pool.clone(),
                auth_service,
            )),
            orders: Arc::new(crate::services::orders::OrderService::new(db_pool.clone())),
            inventory: Arc::new(crate::services::inventory::InventoryService::new(
                db_pool.clone(),
                config.low_stock_threshold,
            )),
            lab_orders: Arc::new(crate::services::lab_orders::LabOrderService::new(
                db_pool.clone(),
            )),
            reports: Arc::new(crate::services::reports::ReportService::new(
                db_pool.clone(),
                config.low_stock_threshold,
            )),
            commissions: Arc::new(crate::services::commissions::CommissionService::new(
                db_pool.clone(),
                Decimal::from_f64(config.default_commission_rate)
                    .unwrap_or_else(|| Decimal::new(5, 2)),
            )),
            expenses: Arc::new(crate::services::expenses::ExpenseService::new(db_pool)),
        }
    }
}
