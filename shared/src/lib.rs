//! Shared domain types and business rules for the ERP back-office
//!
//! Everything in this crate is free of I/O so the rules that guard stock,
//! totals and scheduling can be exercised without a database.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
