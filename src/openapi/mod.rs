use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Optica POS API",
        description = "Point of sale, lens lab, inventory, reporting, commissions \
                       and expense tracking for an optical retail store. All routes \
                       except token issuance and registration require a bearer token.",
    ),
    tags(
        (name = "users", description = "Accounts and authentication"),
        (name = "pos", description = "Register screen: products and orders"),
        (name = "lab-orders", description = "Lens lab workflow and prescriptions"),
        (name = "inventory", description = "Stock levels and the movement ledger"),
        (name = "reports", description = "Sales and inventory reporting"),
        (name = "commissions", description = "Seller commissions and rules"),
        (name = "expenses", description = "Operating expenses (admin)"),
        (name = "health", description = "Service health"),
    ),
    paths(
        handlers::users::login,
        handlers::users::register,
        handlers::users::get_me,
        handlers::users::update_me,
        handlers::users::deactivate_me,
        handlers::users::list_users,
        handlers::users::toggle_admin,
        handlers::pos::list_products,
        handlers::pos::get_product,
        handlers::pos::create_product,
        handlers::pos::create_order,
        handlers::pos::list_orders,
        handlers::pos::get_order,
        handlers::pos::update_order_status,
        handlers::lab_orders::list_lab_orders,
        handlers::lab_orders::create_lab_order,
        handlers::lab_orders::get_lab_order,
        handlers::lab_orders::update_lab_order_status,
        handlers::lab_orders::update_lab_order_notes,
        handlers::lab_orders::get_prescription,
        handlers::lab_orders::update_prescription,
        handlers::inventory::list_inventory,
        handlers::inventory::list_low_stock,
        handlers::inventory::inventory_stats,
        handlers::inventory::create_product,
        handlers::inventory::update_product,
        handlers::inventory::adjust_stock,
        handlers::inventory::delete_product,
        handlers::reports::daily_sales,
        handlers::reports::monthly_sales,
        handlers::reports::sales_summary,
        handlers::reports::top_products,
        handlers::reports::movement_report,
        handlers::reports::low_stock_report,
        handlers::commissions::calculate,
        handlers::commissions::summary,
        handlers::commissions::top_performers,
        handlers::commissions::list_rules,
        handlers::commissions::upsert_rule,
        handlers::commissions::delete_rule,
        handlers::expenses::create_expense,
        handlers::expenses::list_expenses,
        handlers::expenses::expense_summary,
        handlers::expenses::list_categories,
        handlers::expenses::get_expense,
        handlers::expenses::update_expense,
        handlers::expenses::delete_expense,
        handlers::health::health_check,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::services::users::RegisterUserRequest,
        crate::services::users::LoginRequest,
        crate::services::users::UpdateProfileRequest,
        crate::services::users::UserResponse,
        crate::services::users::LoginResponse,
        crate::services::users::UserListResponse,
        crate::services::orders::OrderItemRequest,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::UpdateOrderStatusRequest,
        crate::services::orders::OrderItemResponse,
        crate::services::orders::OrderResponse,
        crate::services::orders::OrderSummaryResponse,
        crate::services::orders::OrderListResponse,
        crate::services::inventory::CreateProductRequest,
        crate::services::inventory::UpdateProductRequest,
        crate::services::inventory::AdjustStockRequest,
        crate::services::inventory::ProductResponse,
        crate::services::inventory::ProductListResponse,
        crate::services::inventory::StockAdjustmentResponse,
        crate::services::inventory::InventoryStatsResponse,
        crate::services::lab_orders::PrescriptionRequest,
        crate::services::lab_orders::PrescriptionResponse,
        crate::services::lab_orders::CreateLabOrderRequest,
        crate::services::lab_orders::UpdateLabOrderStatusRequest,
        crate::services::lab_orders::UpdateLabOrderNotesRequest,
        crate::services::lab_orders::LabOrderResponse,
        crate::services::lab_orders::LabOrderListResponse,
        crate::services::reports::DailySalesReport,
        crate::services::reports::MonthlySalesReport,
        crate::services::reports::SalesSummaryReport,
        crate::services::reports::TopProductEntry,
        crate::services::reports::MovementReport,
        crate::services::reports::LowStockReport,
        crate::services::commissions::UpsertRuleRequest,
        crate::services::commissions::CommissionRuleResponse,
        crate::services::commissions::UserCommission,
        crate::services::commissions::CommissionReport,
        crate::services::commissions::CommissionSummary,
        crate::services::expenses::CreateExpenseRequest,
        crate::services::expenses::UpdateExpenseRequest,
        crate::services::expenses::ExpenseResponse,
        crate::services::expenses::ExpenseListResponse,
        crate::services::expenses::ExpenseSummary,
        crate::handlers::health::HealthResponse,
    )),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Swagger UI mounted at `/swagger-ui`, serving the spec from
/// `/api-docs/openapi.json`
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
