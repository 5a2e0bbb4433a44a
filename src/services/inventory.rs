use crate::{
    db::DbPool,
    entities::inventory_movement::{self, Entity as MovementEntity},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Why a ledger row exists. Every stock change carries exactly one reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MovementReason {
    Sale,
    Restock,
    Adjustment,
    Initial,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 64, message = "SKU must be 1-64 characters"))]
    pub sku: String,
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    #[validate(length(min = 1, max = 100, message = "Category is required"))]
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    /// Opening stock; recorded as an `initial` ledger entry.
    #[serde(default)]
    pub initial_stock: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Category must not be empty"))]
    pub category: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    /// Signed change; positive restocks, negative removes stock.
    pub quantity_delta: i32,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            sku: model.sku,
            name: model.name,
            category: model.category,
            description: model.description,
            price: model.price,
            stock: model.stock,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StockAdjustmentResponse {
    pub product: ProductResponse,
    pub movement_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct InventoryStatsResponse {
    pub total_products: u64,
    pub total_stock: i64,
    pub low_stock_count: u64,
    pub out_of_stock_count: u64,
    pub total_value: Decimal,
}

/// Service for the product catalog and the stock ledger behind it.
///
/// Stock is only ever written together with an `inventory_movements` row, in
/// the same transaction, so the ledger sum always equals the column.
#[derive(Clone)]
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    low_stock_threshold: i32,
}

impl InventoryService {
    /// Creates a new inventory service instance
    pub fn new(db_pool: Arc<DbPool>, low_stock_threshold: i32) -> Self {
        Self {
            db_pool,
            low_stock_threshold,
        }
    }

    /// Default threshold used when a caller does not supply one
    pub fn low_stock_threshold(&self) -> i32 {
        self.low_stock_threshold
    }

    /// Lists products with optional category/name/low-stock filters
    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = ProductEntity::find();
        if let Some(category) = filter.category {
            query = query.filter(product::Column::Category.eq(category));
        }
        if let Some(search) = filter.search {
            query = query.filter(product::Column::Name.contains(&search));
        }
        if filter.low_stock.unwrap_or(false) {
            query = query.filter(product::Column::Stock.lte(self.low_stock_threshold));
        }

        let paginator = query
            .order_by_asc(product::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count products");
            ServiceError::DatabaseError(e)
        })?;

        let products = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, "Failed to fetch products page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(ProductListResponse {
            products: products.into_iter().map(ProductResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Lists products at or below the given stock threshold
    #[instrument(skip(self))]
    pub async fn list_low_stock(
        &self,
        threshold: Option<i32>,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let db = &*self.db_pool;
        let threshold = threshold.unwrap_or(self.low_stock_threshold);

        let products = ProductEntity::find()
            .filter(product::Column::Stock.lte(threshold))
            .order_by_asc(product::Column::Stock)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch low-stock products");
                ServiceError::DatabaseError(e)
            })?;

        Ok(products.into_iter().map(ProductResponse::from).collect())
    }

    /// Retrieves a product by id
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        let db = &*self.db_pool;

        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        Ok(ProductResponse::from(product))
    }

    /// Adds a catalog product. Opening stock is written through the ledger in
    /// the same transaction.
    #[instrument(skip(self, request), fields(sku = %request.sku))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
        recorded_by: Uuid,
    ) -> Result<ProductResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price must not be negative".to_string(),
            ));
        }
        if request.initial_stock < 0 {
            return Err(ServiceError::ValidationError(
                "Initial stock must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let sku_taken = ProductEntity::find()
            .filter(product::Column::Sku.eq(request.sku.clone()))
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check SKU uniqueness");
                ServiceError::DatabaseError(e)
            })?;
        if sku_taken > 0 {
            return Err(ServiceError::ValidationError(format!(
                "SKU {} is already in use",
                request.sku
            )));
        }

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for product creation");
            ServiceError::DatabaseError(e)
        })?;

        let now = Utc::now();
        let product_model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            sku: Set(request.sku),
            name: Set(request.name),
            category: Set(request.category),
            description: Set(request.description),
            price: Set(request.price),
            stock: Set(request.initial_stock),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        if request.initial_stock > 0 {
            inventory_movement::ActiveModel {
                id: Set(Uuid::new_v4()),
                product_id: Set(product_model.id),
                quantity_delta: Set(request.initial_stock),
                reason: Set(MovementReason::Initial.to_string()),
                reference: Set(None),
                recorded_by: Set(recorded_by),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_model.id, "Failed to record initial stock movement");
                ServiceError::DatabaseError(e)
            })?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit product creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_model.id, sku = %product_model.sku, stock = product_model.stock, "Product created");

        Ok(ProductResponse::from(product_model))
    }

    /// Updates product metadata. Stock is deliberately not touched here; use
    /// `adjust_stock` so the ledger stays complete.
    #[instrument(skip(self, request), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if let Some(price) = request.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Price must not be negative".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;

        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let mut active: product::ActiveModel = product.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(category) = request.category {
            active.category = Set(category);
        }
        if let Some(description) = request.description {
            active.description = Set(Some(description));
        }
        if let Some(price) = request.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product metadata updated");

        Ok(ProductResponse::from(updated))
    }

    /// Applies a signed stock change, writing the ledger row and the running
    /// total in one transaction. Rejects changes that would leave stock
    /// negative.
    #[instrument(skip(self, request), fields(product_id = %product_id, delta = request.quantity_delta))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        request: AdjustStockRequest,
        recorded_by: Uuid,
    ) -> Result<StockAdjustmentResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let reason: MovementReason = request.reason.parse().map_err(|_| {
            ServiceError::ValidationError(format!("Unknown movement reason: {}", request.reason))
        })?;

        if request.quantity_delta == 0 {
            return Err(ServiceError::ValidationError(
                "Quantity delta must not be zero".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for stock adjustment");
            ServiceError::DatabaseError(e)
        })?;

        let product = ProductEntity::find_by_id(product_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for stock adjustment");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let new_stock = product.stock + request.quantity_delta;
        if new_stock < 0 {
            warn!(
                product_id = %product_id,
                stock = product.stock,
                delta = request.quantity_delta,
                "Rejected stock adjustment below zero"
            );
            return Err(ServiceError::BusinessRuleViolation(format!(
                "Adjustment would take stock of product {} below zero",
                product_id
            )));
        }

        let movement = inventory_movement::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product_id),
            quantity_delta: Set(request.quantity_delta),
            reason: Set(reason.to_string()),
            reference: Set(request.reference),
            recorded_by: Set(recorded_by),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to record stock movement");
            ServiceError::DatabaseError(e)
        })?;

        let mut active: product::ActiveModel = product.into();
        active.stock = Set(new_stock);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to update product stock");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to commit stock adjustment");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            product_id = %product_id,
            delta = request.quantity_delta,
            new_stock = new_stock,
            reason = %reason,
            "Stock adjusted"
        );

        Ok(StockAdjustmentResponse {
            product: ProductResponse::from(updated),
            movement_id: movement.id,
        })
    }

    /// Removes a product from the catalog. Refused when any order line
    /// references it, since past sales must stay reconstructable.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let product = ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for deletion");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let referenced = OrderItemEntity::find()
            .filter(order_item::Column::ProductId.eq(product_id))
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to check order references");
                ServiceError::DatabaseError(e)
            })?;
        if referenced > 0 {
            return Err(ServiceError::BusinessRuleViolation(format!(
                "Product {} is referenced by {} order line(s) and cannot be deleted",
                product_id, referenced
            )));
        }

        product.delete(db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to delete product");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product deleted");

        Ok(())
    }

    /// Aggregate catalog statistics
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<InventoryStatsResponse, ServiceError> {
        let db = &*self.db_pool;

        let products = ProductEntity::find().all(db).await.map_err(|e| {
            error!(error = %e, "Failed to fetch products for stats");
            ServiceError::DatabaseError(e)
        })?;

        let total_products = products.len() as u64;
        let total_stock: i64 = products.iter().map(|p| i64::from(p.stock)).sum();
        let low_stock_count = products
            .iter()
            .filter(|p| p.stock <= self.low_stock_threshold)
            .count() as u64;
        let out_of_stock_count = products.iter().filter(|p| p.stock == 0).count() as u64;
        let total_value: Decimal = products
            .iter()
            .map(|p| p.price * Decimal::from(p.stock))
            .sum();

        Ok(InventoryStatsResponse {
            total_products,
            total_stock,
            low_stock_count,
            out_of_stock_count,
            total_value,
        })
    }

    /// Sum of ledger deltas for one product. Used by integrity checks and
    /// tests; equals `products.stock` at all times.
    pub async fn ledger_sum(&self, product_id: Uuid) -> Result<i64, ServiceError> {
        let db = &*self.db_pool;

        let movements = MovementEntity::find()
            .filter(inventory_movement::Column::ProductId.eq(product_id))
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch movements for ledger sum");
                ServiceError::DatabaseError(e)
            })?;

        Ok(movements.iter().map(|m| i64::from(m.quantity_delta)).sum())
    }
}
