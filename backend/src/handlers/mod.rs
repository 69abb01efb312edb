//! HTTP request handlers

mod customer;
mod dashboard;
mod health;
mod notification;
mod order;
mod planning;
mod product;
mod stock;

pub use customer::*;
pub use dashboard::*;
pub use health::*;
pub use notification::*;
pub use order::*;
pub use planning::*;
pub use product::*;
pub use stock::*;
