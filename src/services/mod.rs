// Domain services. Each owns the status/category enums for its tables
// and exposes request/response DTOs consumed by the handlers.
pub mod commissions;
pub mod expenses;
pub mod inventory;
pub mod lab_orders;
pub mod orders;
pub mod reports;
pub mod users;
