//! Domain models for the ERP back-office

mod notification;
mod order;
mod planning;
mod product;
mod stock;
mod user;

pub use notification::*;
pub use order::*;
pub use planning::*;
pub use product::*;
pub use stock::*;
pub use user::*;
