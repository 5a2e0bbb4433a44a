pub mod commission_rule;
pub mod expense;
pub mod inventory_movement;
pub mod lab_order;
pub mod order;
pub mod order_item;
pub mod prescription;
pub mod product;
pub mod user;
