//! Dashboard summary service

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::order::{self, OrderListItem};
use crate::services::product::{Product, ProductResponse};

/// Dashboard service for the landing page figures
#[derive(Clone)]
pub struct DashboardService {
    db: PgPool,
    preview_limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub active_orders: i64,
    pub low_stock_count: i64,
    pub delayed_orders: i64,
    pub low_stock_products: Vec<ProductResponse>,
    pub recent_orders: Vec<OrderListItem>,
}

impl DashboardService {
    /// Create a new DashboardService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            preview_limit: config.dashboard.preview_limit,
        }
    }

    pub async fn summary(&self) -> AppResult<DashboardSummary> {
        let counts = order::count_by_status(&self.db).await?;
        let delayed_orders = order::count_delayed(&self.db, Utc::now().date_naive()).await?;

        let low_stock_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM products WHERE is_active AND current_stock <= min_stock",
        )
        .fetch_one(&self.db)
        .await?;

        let low_stock_products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, reference, name, description, price, min_stock, max_stock,
                   current_stock, is_active, archived_at, created_at, updated_at
            FROM products
            WHERE is_active AND current_stock <= min_stock
            ORDER BY current_stock, reference
            LIMIT $1
            "#,
        )
        .bind(self.preview_limit)
        .fetch_all(&self.db)
        .await?;

        let recent_orders = order::recent_orders(&self.db, self.preview_limit).await?;

        Ok(DashboardSummary {
            active_orders: counts.in_production,
            low_stock_count,
            delayed_orders,
            low_stock_products: low_stock_products
                .into_iter()
                .map(ProductResponse::from)
                .collect(),
            recent_orders,
        })
    }
}
