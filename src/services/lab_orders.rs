use crate::{
    db::DbPool,
    entities::lab_order::{self, Entity as LabOrderEntity, Model as LabOrderModel},
    entities::prescription::{self, Entity as PrescriptionEntity, Model as PrescriptionModel},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::{Display, EnumString};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Lab workflow states. Orders move strictly forward; `cancelled` is
/// reachable until the job is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LabOrderStatus {
    Received,
    InProgress,
    Ready,
    Delivered,
    Cancelled,
}

impl LabOrderStatus {
    /// Returns true when the workflow allows moving to `next`.
    pub fn can_transition_to(self, next: LabOrderStatus) -> bool {
        use LabOrderStatus::*;
        matches!(
            (self, next),
            (Received, InProgress)
                | (Received, Cancelled)
                | (InProgress, Ready)
                | (InProgress, Cancelled)
                | (Ready, Delivered)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct PrescriptionRequest {
    pub right_sphere: Decimal,
    pub right_cylinder: Decimal,
    #[validate(range(min = 0, max = 180, message = "Axis must be between 0 and 180 degrees"))]
    pub right_axis: i32,
    pub right_add: Option<Decimal>,
    pub left_sphere: Decimal,
    pub left_cylinder: Decimal,
    #[validate(range(min = 0, max = 180, message = "Axis must be between 0 and 180 degrees"))]
    pub left_axis: i32,
    pub left_add: Option<Decimal>,
    #[validate(length(min = 1, max = 100, message = "Lens material is required"))]
    pub material: String,
    #[validate(length(min = 1, max = 100, message = "Lens treatment is required"))]
    pub treatment: String,
    #[serde(default)]
    pub requires_add: bool,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrescriptionResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub right_sphere: Decimal,
    pub right_cylinder: Decimal,
    pub right_axis: i32,
    pub right_add: Option<Decimal>,
    pub left_sphere: Decimal,
    pub left_cylinder: Decimal,
    pub left_axis: i32,
    pub left_add: Option<Decimal>,
    pub material: String,
    pub treatment: String,
    pub requires_add: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<PrescriptionModel> for PrescriptionResponse {
    fn from(model: PrescriptionModel) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            right_sphere: model.right_sphere,
            right_cylinder: model.right_cylinder,
            right_axis: model.right_axis,
            right_add: model.right_add,
            left_sphere: model.left_sphere,
            left_cylinder: model.left_cylinder,
            left_axis: model.left_axis,
            left_add: model.left_add,
            material: model.material,
            treatment: model.treatment,
            requires_add: model.requires_add,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateLabOrderRequest {
    pub prescription_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLabOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLabOrderNotesRequest {
    #[validate(length(max = 2000, message = "Notes are limited to 2000 characters"))]
    pub notes: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LabOrderResponse {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LabOrderListResponse {
    pub lab_orders: Vec<LabOrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for the lens lab workflow and the prescriptions behind it
#[derive(Clone)]
pub struct LabOrderService {
    db_pool: Arc<DbPool>,
}

impl LabOrderService {
    /// Creates a new lab order service instance
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Creates a lab order for an existing prescription
    #[instrument(skip(self, request), fields(prescription_id = %request.prescription_id))]
    pub async fn create_lab_order(
        &self,
        request: CreateLabOrderRequest,
    ) -> Result<LabOrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let prescription_exists = PrescriptionEntity::find_by_id(request.prescription_id)
            .count(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check prescription for lab order");
                ServiceError::DatabaseError(e)
            })?;
        if prescription_exists == 0 {
            return Err(ServiceError::NotFound(format!(
                "Prescription {} not found",
                request.prescription_id
            )));
        }

        let lab_order = lab_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            prescription_id: Set(request.prescription_id),
            status: Set(LabOrderStatus::Received.to_string()),
            notes: Set(request.notes),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create lab order");
            ServiceError::DatabaseError(e)
        })?;

        info!(lab_order_id = %lab_order.id, "Lab order created");

        Ok(self.model_to_response(lab_order))
    }

    /// Lists lab orders, optionally filtered by status
    #[instrument(skip(self))]
    pub async fn list_lab_orders(
        &self,
        status: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<LabOrderListResponse, ServiceError> {
        let db = &*self.db_pool;

        let mut query = LabOrderEntity::find();
        if let Some(raw) = status {
            let parsed: LabOrderStatus = raw.parse().map_err(|_| {
                ServiceError::ValidationError(format!("Unknown lab order status: {}", raw))
            })?;
            query = query.filter(lab_order::Column::Status.eq(parsed.to_string()));
        }

        let paginator = query
            .order_by_desc(lab_order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count lab orders");
            ServiceError::DatabaseError(e)
        })?;

        let lab_orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, "Failed to fetch lab orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(LabOrderListResponse {
            lab_orders: lab_orders
                .into_iter()
                .map(|m| self.model_to_response(m))
                .collect(),
            total,
            page,
            per_page,
        })
    }

    /// Retrieves a lab order by id
    #[instrument(skip(self), fields(lab_order_id = %lab_order_id))]
    pub async fn get_lab_order(&self, lab_order_id: Uuid) -> Result<LabOrderResponse, ServiceError> {
        let db = &*self.db_pool;

        let lab_order = LabOrderEntity::find_by_id(lab_order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, lab_order_id = %lab_order_id, "Failed to fetch lab order");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Lab order {} not found", lab_order_id))
            })?;

        Ok(self.model_to_response(lab_order))
    }

    /// Moves a lab order to a new workflow state
    #[instrument(skip(self, request), fields(lab_order_id = %lab_order_id, new_status = %request.status))]
    pub async fn update_status(
        &self,
        lab_order_id: Uuid,
        request: UpdateLabOrderStatusRequest,
    ) -> Result<LabOrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let target: LabOrderStatus = request.status.parse().map_err(|_| {
            ServiceError::ValidationError(format!("Unknown lab order status: {}", request.status))
        })?;

        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for lab order status update");
            ServiceError::DatabaseError(e)
        })?;

        let lab_order = LabOrderEntity::find_by_id(lab_order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, lab_order_id = %lab_order_id, "Failed to fetch lab order for status update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Lab order {} not found", lab_order_id))
            })?;

        let current: LabOrderStatus = lab_order.status.parse().map_err(|_| {
            error!(lab_order_id = %lab_order_id, status = %lab_order.status, "Lab order carries unrecognised status");
            ServiceError::InternalServerError
        })?;

        if !current.can_transition_to(target) {
            warn!(
                lab_order_id = %lab_order_id,
                current = %current,
                target = %target,
                "Rejected lab order status transition"
            );
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move lab order from {} to {}",
                current, target
            )));
        }

        let mut active: lab_order::ActiveModel = lab_order.into();
        active.status = Set(target.to_string());
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, lab_order_id = %lab_order_id, "Failed to update lab order status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, lab_order_id = %lab_order_id, "Failed to commit lab order status update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            lab_order_id = %lab_order_id,
            old_status = %current,
            new_status = %target,
            "Lab order status updated"
        );

        Ok(self.model_to_response(updated))
    }

    /// Replaces the free-form notes on a lab order
    #[instrument(skip(self, request), fields(lab_order_id = %lab_order_id))]
    pub async fn update_notes(
        &self,
        lab_order_id: Uuid,
        request: UpdateLabOrderNotesRequest,
    ) -> Result<LabOrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let lab_order = LabOrderEntity::find_by_id(lab_order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, lab_order_id = %lab_order_id, "Failed to fetch lab order for notes update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Lab order {} not found", lab_order_id))
            })?;

        let mut active: lab_order::ActiveModel = lab_order.into();
        active.notes = Set(Some(request.notes));
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, lab_order_id = %lab_order_id, "Failed to update lab order notes");
            ServiceError::DatabaseError(e)
        })?;

        info!(lab_order_id = %lab_order_id, "Lab order notes updated");

        Ok(self.model_to_response(updated))
    }

    /// Retrieves a prescription by id
    #[instrument(skip(self), fields(prescription_id = %prescription_id))]
    pub async fn get_prescription(
        &self,
        prescription_id: Uuid,
    ) -> Result<PrescriptionResponse, ServiceError> {
        let db = &*self.db_pool;

        let prescription = PrescriptionEntity::find_by_id(prescription_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, prescription_id = %prescription_id, "Failed to fetch prescription");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Prescription {} not found", prescription_id))
            })?;

        Ok(PrescriptionResponse::from(prescription))
    }

    /// Replaces the clinical fields of a prescription
    #[instrument(skip(self, request), fields(prescription_id = %prescription_id))]
    pub async fn update_prescription(
        &self,
        prescription_id: Uuid,
        request: PrescriptionRequest,
    ) -> Result<PrescriptionResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        let prescription = PrescriptionEntity::find_by_id(prescription_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, prescription_id = %prescription_id, "Failed to fetch prescription for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Prescription {} not found", prescription_id))
            })?;

        let mut active: prescription::ActiveModel = prescription.into();
        active.right_sphere = Set(request.right_sphere);
        active.right_cylinder = Set(request.right_cylinder);
        active.right_axis = Set(request.right_axis);
        active.right_add = Set(request.right_add);
        active.left_sphere = Set(request.left_sphere);
        active.left_cylinder = Set(request.left_cylinder);
        active.left_axis = Set(request.left_axis);
        active.left_add = Set(request.left_add);
        active.material = Set(request.material);
        active.treatment = Set(request.treatment);
        active.requires_add = Set(request.requires_add);
        active.notes = Set(request.notes);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, prescription_id = %prescription_id, "Failed to update prescription");
            ServiceError::DatabaseError(e)
        })?;

        info!(prescription_id = %prescription_id, "Prescription updated");

        Ok(PrescriptionResponse::from(updated))
    }

    /// Converts a lab order model to response format
    fn model_to_response(&self, model: LabOrderModel) -> LabOrderResponse {
        LabOrderResponse {
            id: model.id,
            prescription_id: model.prescription_id,
            status: model.status,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    #[test]
    fn status_strings_round_trip() {
        assert_eq!(LabOrderStatus::Received.to_string(), "received");
        assert_eq!(LabOrderStatus::InProgress.to_string(), "in-progress");
        assert_eq!(LabOrderStatus::Ready.to_string(), "ready");
        assert_eq!(LabOrderStatus::Delivered.to_string(), "delivered");
        assert_eq!(LabOrderStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(
            "in-progress".parse::<LabOrderStatus>().unwrap(),
            LabOrderStatus::InProgress
        );
        assert!("polishing".parse::<LabOrderStatus>().is_err());
    }

    #[rstest::rstest]
    #[case(LabOrderStatus::Received, LabOrderStatus::InProgress, true)]
    #[case(LabOrderStatus::Received, LabOrderStatus::Cancelled, true)]
    #[case(LabOrderStatus::InProgress, LabOrderStatus::Ready, true)]
    #[case(LabOrderStatus::InProgress, LabOrderStatus::Cancelled, true)]
    #[case(LabOrderStatus::Ready, LabOrderStatus::Delivered, true)]
    // No skipping stages
    #[case(LabOrderStatus::Received, LabOrderStatus::Ready, false)]
    #[case(LabOrderStatus::Received, LabOrderStatus::Delivered, false)]
    #[case(LabOrderStatus::InProgress, LabOrderStatus::Delivered, false)]
    // No moving backwards
    #[case(LabOrderStatus::Ready, LabOrderStatus::InProgress, false)]
    #[case(LabOrderStatus::InProgress, LabOrderStatus::Received, false)]
    // Ready jobs are already built, too late to cancel
    #[case(LabOrderStatus::Ready, LabOrderStatus::Cancelled, false)]
    fn workflow_moves_strictly_forward(
        #[case] from: LabOrderStatus,
        #[case] to: LabOrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn terminal_states_stay_terminal() {
        use LabOrderStatus::*;

        for next in [Received, InProgress, Ready, Delivered, Cancelled] {
            assert!(!Delivered.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[tokio::test]
    async fn update_status_rejects_unknown_status_before_lookup() {
        let service = LabOrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let err = service
            .update_status(
                Uuid::new_v4(),
                UpdateLabOrderStatusRequest {
                    status: "polishing".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[test]
    fn model_to_response_conversion() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let prescription_id = Uuid::new_v4();
        let model = LabOrderModel {
            id,
            prescription_id,
            status: "received".to_string(),
            notes: Some("Rush job".to_string()),
            created_at: now,
            updated_at: None,
        };

        let service = LabOrderService::new(Arc::new(DatabaseConnection::Disconnected));
        let response = service.model_to_response(model);

        assert_eq!(response.id, id);
        assert_eq!(response.prescription_id, prescription_id);
        assert_eq!(response.status, "received");
        assert_eq!(response.notes.as_deref(), Some("Rush job"));
    }
}
