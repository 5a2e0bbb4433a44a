use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Optical prescription captured at checkout. Sphere and cylinder are in
/// diopters, axis in degrees (0-180), `add` only for progressive lenses.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prescriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(has_many = "super::lab_order::Entity")]
    LabOrders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::lab_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LabOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
