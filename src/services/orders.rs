use crate::{
    db::DbPool,
    entities::inventory_movement,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    entities::prescription::{self, Entity as PrescriptionEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    services::inventory::MovementReason,
    services::lab_orders::{PrescriptionRequest, PrescriptionResponse},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Sales order lifecycle. Orders open as `pending`; both `completed` and
/// `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Completed) | (Pending, Cancelled))
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "An order needs at least one line item"))]
    #[validate]
    pub items: Vec<OrderItemRequest>,
    /// Optional lens prescription captured at the counter.
    #[validate]
    pub prescription: Option<PrescriptionRequest>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_time: Decimal,
    pub line_total: Decimal,
}

impl From<OrderItemModel> for OrderItemResponse {
    fn from(model: OrderItemModel) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            price_at_time: model.price_at_time,
            line_total: model.price_at_time * Decimal::from(model.quantity),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub prescription: Option<PrescriptionResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderSummaryResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderSummaryResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            total_amount: model.total_amount,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for order entry at the register.
///
/// Order creation is all-or-nothing: stock checks, decrements, ledger rows,
/// the order, its lines, and the optional prescription all commit together
/// or not at all.
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Rings up a sale for the given seller
    #[instrument(skip(self, request), fields(user_id = %user_id, line_count = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        // Validate every line and stage the stock writes before any row is
        // inserted, so a late failure rolls everything back.
        let mut total_amount = Decimal::ZERO;
        let mut line_items: Vec<order_item::ActiveModel> = Vec::with_capacity(request.items.len());
        let mut item_responses: Vec<OrderItemResponse> = Vec::with_capacity(request.items.len());

        for item in &request.items {
            let product = ProductEntity::find_by_id(item.product_id)
                .one(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, product_id = %item.product_id, "Failed to fetch product for order");
                    ServiceError::DatabaseError(e)
                })?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", item.product_id))
                })?;

            if product.stock < item.quantity {
                warn!(
                    product_id = %product.id,
                    requested = item.quantity,
                    available = product.stock,
                    "Rejected order line over available stock"
                );
                return Err(ServiceError::InsufficientStock(format!(
                    "{} (requested {}, available {})",
                    product.name, item.quantity, product.stock
                )));
            }

            let price_at_time = product.price;
            let line_total = price_at_time * Decimal::from(item.quantity);
            total_amount += line_total;

            let new_stock = product.stock - item.quantity;
            let mut product_active: product::ActiveModel = product.into();
            product_active.stock = Set(new_stock);
            product_active.updated_at = Set(Some(now));
            product_active.update(&txn).await.map_err(|e| {
                error!(error = %e, product_id = %item.product_id, "Failed to decrement stock");
                ServiceError::DatabaseError(e)
            })?;

            inventory_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(item.product_id),
                quantity_delta: Set(-item.quantity),
                reason: Set(MovementReason::Sale.to_string()),
                reference: Set(Some(order_id.to_string())),
                recorded_by: Set(user_id),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %item.product_id, "Failed to record sale movement");
                ServiceError::DatabaseError(e)
            })?;

            let item_id = Uuid::new_v4();
            line_items.push(order_item::ActiveModel {
                id: Set(item_id),
                order_id: Set(order_id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price_at_time: Set(price_at_time),
                created_at: Set(now),
            });
            item_responses.push(OrderItemResponse {
                id: item_id,
                product_id: item.product_id,
                quantity: item.quantity,
                price_at_time,
                line_total,
            });
        }

        let order_model = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            total_amount: Set(total_amount),
            status: Set(OrderStatus::Pending.to_string()),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        for line in line_items {
            line.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to create order line");
                ServiceError::DatabaseError(e)
            })?;
        }

        let prescription_response = match request.prescription {
            Some(rx) => Some(Self::insert_prescription(&txn, order_id, rx, now).await?),
            None => None,
        };

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            user_id = %user_id,
            total = %total_amount,
            "Order created"
        );

        Ok(OrderResponse {
            id: order_model.id,
            user_id: order_model.user_id,
            total_amount: order_model.total_amount,
            status: order_model.status,
            items: item_responses,
            prescription: prescription_response,
            created_at: order_model.created_at,
            updated_at: order_model.updated_at,
        })
    }

    async fn insert_prescription(
        txn: &DatabaseTransaction,
        order_id: Uuid,
        rx: PrescriptionRequest,
        now: DateTime<Utc>,
    ) -> Result<PrescriptionResponse, ServiceError> {
        let model = prescription::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            right_sphere: Set(rx.right_sphere),
            right_cylinder: Set(rx.right_cylinder),
            right_axis: Set(rx.right_axis),
            right_add: Set(rx.right_add),
            left_sphere: Set(rx.left_sphere),
            left_cylinder: Set(rx.left_cylinder),
            left_axis: Set(rx.left_axis),
            left_add: Set(rx.left_add),
            material: Set(rx.material),
            treatment: Set(rx.treatment),
            requires_add: Set(rx.requires_add),
            notes: Set(rx.notes),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create prescription");
            ServiceError::DatabaseError(e)
        })?;

        Ok(PrescriptionResponse::from(model))
    }

    /// Lists orders with status/seller/date filters
    #[instrument(skip(self, filter))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = OrderEntity::find();
        if let Some(raw) = filter.status {
            let parsed: OrderStatus = raw.parse().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown order status: {}", raw))
            })?;
            query = query.filter(order::Column::Status.eq(parsed.to_string()));
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        if let Some(from) = filter.date_from {
            query = query.filter(order::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.date_to {
            query = query.filter(order::Column::CreatedAt.lt(to));
        }

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(OrderSummaryResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Retrieves an order with its lines and prescription
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order items");
                ServiceError::DatabaseError(e)
            })?;

        let prescription = PrescriptionEntity::find()
            .filter(prescription::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order prescription");
                ServiceError::DatabaseError(e)
            })?;

        Ok(OrderResponse {
            id: order.id,
            user_id: order.user_id,
            total_amount: order.total_amount,
            status: order.status,
            items: items.into_iter().map(OrderItemResponse::from).collect(),
            prescription: prescription.map(PrescriptionResponse::from),
            created_at: order.created_at,
            updated_at: order.updated_at,
        })
    }

    /// Moves an order to a new status. Cancelling a pending order puts every
    /// line's stock back through compensating ledger entries.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
        acting_user: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let target: OrderStatus = request.status.parse().map_err(|_| {
            ServiceError::ValidationError(format!("Unknown order status: {}", request.status))
        })?;

        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order status update");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let current: OrderStatus = order.status.parse().map_err(|_| {
            error!(order_id = %order_id, status = %order.status, "Order carries unrecognised status");
            ServiceError::InternalServerError
        })?;

        if !current.can_transition_to(target) {
            warn!(
                order_id = %order_id,
                current = %current,
                target = %target,
                "Rejected order status transition"
            );
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move order from {} to {}",
                current, target
            )));
        }

        if target == OrderStatus::Cancelled {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(order_id))
                .all(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to fetch lines for cancellation");
                    ServiceError::DatabaseError(e)
                })?;

            for item in items {
                let product = ProductEntity::find_by_id(item.product_id)
                    .one(&txn)
                    .await
                    .map_err(|e| {
                        error!(error = %e, product_id = %item.product_id, "Failed to fetch product for restock");
                        ServiceError::DatabaseError(e)
                    })?
                    .ok_or_else(|| {
                        ServiceError::NotFound(format!("Product {} not found", item.product_id))
                    })?;

                let restored = product.stock + item.quantity;
                let mut product_active: product::ActiveModel = product.into();
                product_active.stock = Set(restored);
                product_active.updated_at = Set(Some(now));
                product_active.update(&txn).await.map_err(|e| {
                    error!(error = %e, product_id = %item.product_id, "Failed to restore stock");
                    ServiceError::DatabaseError(e)
                })?;

                inventory_movement::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    product_id: Set(item.product_id),
                    quantity_delta: Set(item.quantity),
                    reason: Set(MovementReason::Adjustment.to_string()),
                    reference: Set(Some(order_id.to_string())),
                    recorded_by: Set(acting_user),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await
                .map_err(|e| {
                    error!(error = %e, product_id = %item.product_id, "Failed to record restock movement");
                    ServiceError::DatabaseError(e)
                })?;
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(target.to_string());
        active.updated_at = Set(Some(now));

        active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %current,
            new_status = %target,
            "Order status updated"
        );

        self.get_order(order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::DatabaseConnection;

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Completed.to_string(), "completed");
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            "completed".parse::<OrderStatus>().unwrap(),
            OrderStatus::Completed
        );
        assert!("refunded".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn completed_and_cancelled_are_terminal() {
        use OrderStatus::*;

        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Cancelled));

        for next in [Pending, Completed, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn line_total_is_price_times_quantity() {
        let model = OrderItemModel {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 3,
            price_at_time: dec!(19.99),
            created_at: Utc::now(),
        };

        let response = OrderItemResponse::from(model);
        assert_eq!(response.line_total, dec!(59.97));
    }

    #[tokio::test]
    async fn create_order_rejects_empty_item_list() {
        let service = OrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let err = service
            .create_order(
                Uuid::new_v4(),
                CreateOrderRequest {
                    items: vec![],
                    prescription: None,
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn create_order_rejects_zero_quantity() {
        let service = OrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let err = service
            .create_order(
                Uuid::new_v4(),
                CreateOrderRequest {
                    items: vec![OrderItemRequest {
                        product_id: Uuid::new_v4(),
                        quantity: 0,
                    }],
                    prescription: None,
                },
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_status_before_lookup() {
        let service = OrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let err = service
            .update_status(
                Uuid::new_v4(),
                UpdateOrderStatusRequest {
                    status: "refunded".to_string(),
                },
                Uuid::new_v4(),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}
