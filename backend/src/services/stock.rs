//! Stock movement service
//!
//! Every write to `products.current_stock` goes through `apply_change`, which
//! stores the matching movement row in the same transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{plan_manual_movement, MovementType, OutPolicy, StockChange, StockLevel};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::Actor;

/// Stock service for manual adjustments and the movement journal
#[derive(Clone)]
pub struct StockService {
    db: PgPool,
    out_policy: OutPolicy,
}

/// Stock movement record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: String,
    pub quantity: i32,
    pub stock_before: i32,
    pub stock_after: i32,
    pub reason: String,
    pub order_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub actor_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Movement joined with its product, for journal listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MovementWithProduct {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub movement: StockMovement,
    pub product_reference: String,
    pub product_name: String,
}

/// Input for a manual stock adjustment
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustStockInput {
    pub movement_type: MovementType,
    pub quantity: i32,
    #[validate(length(min = 1, max = 100, message = "Reason must be 1-100 characters"))]
    pub reason: String,
}

/// Result of a manual adjustment
#[derive(Debug, Clone, Serialize)]
pub struct AdjustStockResult {
    pub product_id: Uuid,
    pub current_stock: i32,
    pub is_low_stock: bool,
    pub movement: StockMovement,
}

/// Query parameters for the movement journal
#[derive(Debug, Default, Deserialize)]
pub struct ListMovementsQuery {
    pub product_id: Option<Uuid>,
    pub movement_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct LockedProduct {
    id: Uuid,
    reference: String,
    current_stock: i32,
    min_stock: i32,
}

const MOVEMENT_COLUMNS: &str = "id, product_id, movement_type, quantity, stock_before, \
     stock_after, reason, order_id, user_id, actor_name, created_at";

/// Lock the given products and read their stock, in ascending id order
pub async fn lock_stock_levels(
    conn: &mut PgConnection,
    product_ids: &[Uuid],
) -> AppResult<BTreeMap<Uuid, StockLevel>> {
    let rows = sqlx::query_as::<_, (Uuid, String, i32)>(
        r#"
        SELECT id, reference, current_stock
        FROM products
        WHERE id = ANY($1)
        ORDER BY id
        FOR UPDATE
        "#,
    )
    .bind(product_ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, reference, current_stock)| {
            (
                id,
                StockLevel {
                    product_id: id,
                    reference,
                    current_stock,
                },
            )
        })
        .collect())
}

/// Write one planned change: the product's new level and its movement row
pub async fn apply_change(
    conn: &mut PgConnection,
    change: &StockChange,
    reason: &str,
    order_id: Option<Uuid>,
    actor: &Actor,
) -> AppResult<StockMovement> {
    sqlx::query("UPDATE products SET current_stock = $2, updated_at = NOW() WHERE id = $1")
        .bind(change.product_id)
        .bind(change.stock_after)
        .execute(&mut *conn)
        .await?;

    let movement = sqlx::query_as::<_, StockMovement>(&format!(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity, stock_before, stock_after,
            reason, order_id, user_id, actor_name
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {}
        "#,
        MOVEMENT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(change.product_id)
    .bind(change.movement_type.as_str())
    .bind(change.quantity)
    .bind(change.stock_before)
    .bind(change.stock_after)
    .bind(reason)
    .bind(order_id)
    .bind(actor.user_id)
    .bind(&actor.name)
    .fetch_one(&mut *conn)
    .await?;

    tracing::info!(
        product_id = %change.product_id,
        movement_type = change.movement_type.as_str(),
        before = change.stock_before,
        after = change.stock_after,
        "Stock changed"
    );

    Ok(movement)
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            out_policy: config.stock.out_policy,
        }
    }

    /// Apply a manual movement to one product under a row lock
    #[tracing::instrument(skip(self, input, actor), fields(user_id = %actor.user_id))]
    pub async fn adjust_stock(
        &self,
        product_id: Uuid,
        input: AdjustStockInput,
        actor: &Actor,
    ) -> AppResult<AdjustStockResult> {
        input.validate()?;
        shared::validate_reason(&input.reason).map_err(|msg| AppError::validation("reason", msg))?;

        let mut tx = self.db.begin().await?;

        let product = sqlx::query_as::<_, LockedProduct>(
            "SELECT id, reference, current_stock, min_stock FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let level = StockLevel {
            product_id: product.id,
            reference: product.reference,
            current_stock: product.current_stock,
        };
        let change = plan_manual_movement(&level, input.movement_type, input.quantity, self.out_policy)?;

        if change.movement_type == MovementType::Out && change.quantity < input.quantity {
            tracing::warn!(
                product_id = %product_id,
                requested = input.quantity,
                removed = change.quantity,
                "Manual out clamped at zero"
            );
        }

        let movement = apply_change(&mut *tx, &change, input.reason.trim(), None, actor).await?;

        tx.commit().await?;

        Ok(AdjustStockResult {
            product_id,
            current_stock: change.stock_after,
            is_low_stock: shared::is_low_stock(change.stock_after, product.min_stock),
            movement,
        })
    }

    /// Movement journal, newest first
    pub async fn list_movements(
        &self,
        query: ListMovementsQuery,
    ) -> AppResult<Vec<MovementWithProduct>> {
        let movement_type = query
            .movement_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<MovementType>)
            .transpose()?;

        let movements = sqlx::query_as::<_, MovementWithProduct>(
            r#"
            SELECT m.id, m.product_id, m.movement_type, m.quantity, m.stock_before,
                   m.stock_after, m.reason, m.order_id, m.user_id, m.actor_name, m.created_at,
                   p.reference AS product_reference, p.name AS product_name
            FROM stock_movements m
            JOIN products p ON p.id = m.product_id
            WHERE ($1::uuid IS NULL OR m.product_id = $1)
              AND ($2::text IS NULL OR m.movement_type = $2)
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(query.product_id)
        .bind(movement_type.map(|t| t.as_str()))
        .bind(shared::clamp_limit(query.limit))
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }

    /// Movements of one product, newest first
    pub async fn product_movements(&self, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)",
        )
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        if !exists {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {} FROM stock_movements WHERE product_id = $1 ORDER BY created_at DESC",
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(movements)
    }
}
