//! Business logic services for the ERP back-office

pub mod customer;
pub mod dashboard;
pub mod notification;
pub mod order;
pub mod planning;
pub mod product;
pub mod stock;

pub use customer::CustomerService;
pub use dashboard::DashboardService;
pub use notification::NotificationService;
pub use order::OrderService;
pub use planning::PlanningService;
pub use product::ProductService;
pub use stock::StockService;

use uuid::Uuid;

use crate::middleware::AuthUser;

/// Who triggered a change, stored on stock movements
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: Uuid,
    pub name: String,
}

impl From<&AuthUser> for Actor {
    fn from(user: &AuthUser) -> Self {
        Self {
            user_id: user.user_id,
            name: user.username.clone(),
        }
    }
}

/// Build an ILIKE pattern matching `term` anywhere, with wildcards escaped
pub fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
