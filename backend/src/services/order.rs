//! Order management service
//!
//! Status changes go through `apply_transition`, which locks the order and
//! the products it touches, then writes the status, the stock levels and the
//! movement journal in the caller's transaction.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    aggregate_demand, can_delete, can_replace_lines, format_order_number, is_delayed,
    order_total, plan_stock_changes,
    plan_stock_effect, total_with_vat, vat_amount, OrderLine, OrderStatus, StatusCounts,
    StockEffect, StockError,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::stock::{self, StockMovement};
use crate::services::{like_pattern, Actor};

/// Order service for the order book and its status workflow
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    vat_rate: Decimal,
    currency: String,
}

/// Order record joined with its customer name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub status: String,
    pub delivery_date: NaiveDate,
    pub total_amount: Decimal,
    pub stock_debited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn order_status(&self) -> AppResult<OrderStatus> {
        Ok(self.status.parse::<OrderStatus>()?)
    }
}

/// Order as shown in lists
#[derive(Debug, Clone, Serialize)]
pub struct OrderListItem {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub is_delayed: bool,
}

/// Order line joined with its product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub product_reference: String,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    #[serde(flatten)]
    pub item: OrderItem,
    pub line_total: Decimal,
}

/// Full order with lines and VAT
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub status_label: String,
    pub is_delayed: bool,
    pub items: Vec<OrderItemView>,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total_with_vat: Decimal,
    pub currency: String,
}

/// One requested order line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Option<Decimal>,
}

/// Input for creating an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    pub delivery_date: NaiveDate,
    #[validate(length(min = 1, message = "An order needs at least one line"))]
    pub items: Vec<OrderItemInput>,
    pub status: Option<OrderStatus>,
}

/// Input for updating an order. Lines can only be replaced on drafts.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderInput {
    pub customer_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    #[validate(length(min = 1, message = "An order needs at least one line"))]
    pub items: Option<Vec<OrderItemInput>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusInput {
    pub status: OrderStatus,
}

/// Query parameters for listing orders
#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

/// What a status change did
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub previous_status: OrderStatus,
    pub status: OrderStatus,
    pub stock_effect: StockEffect,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResult {
    pub order: OrderDetail,
    #[serde(flatten)]
    pub outcome: TransitionOutcome,
}

/// Order counts for the statistics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: i64,
    pub delayed: i64,
}

#[derive(Debug, FromRow)]
struct LockedOrder {
    order_number: String,
    status: String,
    stock_debited: bool,
}

const ORDER_SELECT: &str = r#"
    SELECT o.id, o.order_number, o.customer_id, c.name AS customer_name, o.status,
           o.delivery_date, o.total_amount, o.stock_debited, o.created_at, o.updated_at
    FROM orders o
    JOIN customers c ON c.id = o.customer_id
"#;

fn open_statuses() -> Vec<&'static str> {
    OrderStatus::ALL
        .into_iter()
        .filter(OrderStatus::is_open)
        .map(|s| s.as_str())
        .collect()
}

/// Order counts per status
pub async fn count_by_status(db: &PgPool) -> AppResult<StatusCounts> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM orders GROUP BY status",
    )
    .fetch_all(db)
    .await?;

    let mut counts = StatusCounts::default();
    for (status, count) in rows {
        counts.record(status.parse::<OrderStatus>()?, count);
    }
    Ok(counts)
}

/// Open orders whose delivery date is before `today`
pub async fn count_delayed(db: &PgPool, today: NaiveDate) -> AppResult<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM orders WHERE delivery_date < $1 AND status = ANY($2)",
    )
    .bind(today)
    .bind(open_statuses())
    .fetch_one(db)
    .await?;
    Ok(count)
}

fn to_list_items(orders: Vec<Order>) -> AppResult<Vec<OrderListItem>> {
    let today = Utc::now().date_naive();
    orders
        .into_iter()
        .map(|order| {
            let status = order.order_status()?;
            Ok(OrderListItem {
                status_label: status.to_string(),
                is_delayed: is_delayed(status, order.delivery_date, today),
                order,
            })
        })
        .collect()
}

/// Confirmed and in-production orders, by delivery date
pub async fn scheduled_orders(db: &PgPool) -> AppResult<Vec<OrderListItem>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "{} WHERE o.status IN ('confirmed', 'in_production') ORDER BY o.delivery_date, o.order_number",
        ORDER_SELECT
    ))
    .fetch_all(db)
    .await?;

    to_list_items(orders)
}

/// Most recently created orders
pub async fn recent_orders(db: &PgPool, limit: i64) -> AppResult<Vec<OrderListItem>> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "{} ORDER BY o.created_at DESC LIMIT $1",
        ORDER_SELECT
    ))
    .bind(limit)
    .fetch_all(db)
    .await?;

    to_list_items(orders)
}

async fn fetch_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!("{} WHERE o.id = $1", ORDER_SELECT))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<LockedOrder> {
    sqlx::query_as::<_, LockedOrder>(
        "SELECT order_number, status, stock_debited FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn load_lines(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderLine>> {
    let rows = sqlx::query_as::<_, (Uuid, i32, Decimal)>(
        "SELECT product_id, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, quantity, unit_price)| OrderLine {
            product_id,
            quantity,
            unit_price,
        })
        .collect())
}

/// Replace the lines of an order and store the new total
async fn write_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[OrderLine],
) -> AppResult<Decimal> {
    sqlx::query("DELETE FROM order_items WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for line in lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .execute(&mut *conn)
        .await?;
    }

    let total = order_total(lines);
    sqlx::query("UPDATE orders SET total_amount = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(total)
        .execute(&mut *conn)
        .await?;

    Ok(total)
}

/// Move an order to `to`, applying its stock effect.
///
/// Must run inside a transaction: on error the caller drops it and nothing
/// is written.
#[tracing::instrument(skip(conn, actor), fields(user_id = %actor.user_id))]
pub async fn apply_transition(
    conn: &mut PgConnection,
    order_id: Uuid,
    to: OrderStatus,
    actor: &Actor,
) -> AppResult<TransitionOutcome> {
    let locked = lock_order(conn, order_id).await?;
    let from = locked.status.parse::<OrderStatus>()?;
    let effect = plan_stock_effect(from, to, locked.stock_debited)?;

    if from == to {
        return Ok(TransitionOutcome {
            previous_status: from,
            status: to,
            stock_effect: StockEffect::None,
            movements: Vec::new(),
        });
    }

    let mut movements = Vec::new();
    if matches!(effect, StockEffect::Debit | StockEffect::Restore) {
        let lines = load_lines(conn, order_id).await?;
        let product_ids: Vec<Uuid> = aggregate_demand(&lines).into_keys().collect();
        let levels = stock::lock_stock_levels(conn, &product_ids).await?;

        let changes = match plan_stock_changes(effect, &lines, &levels) {
            Ok(changes) => changes,
            Err(StockError::Insufficient(shortfalls)) => {
                tracing::warn!(
                    order_number = %locked.order_number,
                    shortfalls = %shared::describe_shortfalls(&shortfalls),
                    "Confirmation rejected for insufficient stock"
                );
                return Err(AppError::InsufficientStock(shortfalls));
            }
            Err(err) => return Err(err.into()),
        };

        let reason = match effect {
            StockEffect::Debit => format!("Order {} confirmed", locked.order_number),
            _ => format!("Order {} cancelled", locked.order_number),
        };

        for change in &changes {
            movements.push(stock::apply_change(conn, change, &reason, Some(order_id), actor).await?);
        }
    }

    sqlx::query(
        "UPDATE orders SET status = $2, stock_debited = $3, updated_at = NOW() WHERE id = $1",
    )
    .bind(order_id)
    .bind(to.as_str())
    .bind(effect.holds_stock_after(locked.stock_debited))
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        order_number = %locked.order_number,
        from = from.as_str(),
        to = to.as_str(),
        effect = ?effect,
        movements = movements.len(),
        "Order status changed"
    );

    Ok(TransitionOutcome {
        previous_status: from,
        status: to,
        stock_effect: effect,
        movements,
    })
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            vat_rate: config.business.vat_rate,
            currency: config.business.currency.clone(),
        }
    }

    /// List orders, newest first
    pub async fn list_orders(&self, query: ListOrdersQuery) -> AppResult<Vec<OrderListItem>> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<OrderStatus>()
                    .map_err(|e| AppError::validation("status", e.to_string()))
            })
            .transpose()?;
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(like_pattern);

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            {}
            WHERE ($1::text IS NULL OR o.status = $1)
              AND ($2::text IS NULL OR o.order_number ILIKE $2 OR c.name ILIKE $2)
            ORDER BY o.created_at DESC
            "#,
            ORDER_SELECT
        ))
        .bind(status.map(|s| s.as_str()))
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;

        to_list_items(orders)
    }

    /// Counts per status plus delayed orders
    pub async fn order_stats(&self) -> AppResult<OrderStats> {
        let counts = count_by_status(&self.db).await?;
        let delayed = count_delayed(&self.db, Utc::now().date_naive()).await?;
        Ok(OrderStats {
            total: counts.total(),
            counts,
            delayed,
        })
    }

    /// Get an order with its lines
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = fetch_order(&mut conn, order_id).await?;

        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT i.id, i.order_id, i.product_id, p.reference AS product_reference,
                   p.name AS product_name, i.quantity, i.unit_price
            FROM order_items i
            JOIN products p ON p.id = i.product_id
            WHERE i.order_id = $1
            ORDER BY i.id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        let status = order.order_status()?;
        let total = order.total_amount;

        Ok(OrderDetail {
            status_label: status.to_string(),
            is_delayed: is_delayed(status, order.delivery_date, Utc::now().date_naive()),
            items: items
                .into_iter()
                .map(|item| OrderItemView {
                    line_total: Decimal::from(item.quantity) * item.unit_price,
                    item,
                })
                .collect(),
            vat_rate: self.vat_rate,
            vat_amount: vat_amount(total, self.vat_rate),
            total_with_vat: total_with_vat(total, self.vat_rate),
            currency: self.currency.clone(),
            order,
        })
    }

    /// Turn requested lines into priced lines against active products
    async fn resolve_lines(&self, items: &[OrderItemInput]) -> AppResult<Vec<OrderLine>> {
        for item in items {
            shared::validate_line_quantity(item.quantity)
                .map_err(|msg| AppError::validation("quantity", msg))?;
            if item.unit_price.is_some_and(|price| price < Decimal::ZERO) {
                return Err(AppError::validation("unit_price", "Unit price cannot be negative"));
            }
        }

        let ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
        let products: HashMap<Uuid, (String, Decimal, bool)> =
            sqlx::query_as::<_, (Uuid, String, Decimal, bool)>(
                "SELECT id, reference, price, is_active FROM products WHERE id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(|(id, reference, price, active)| (id, (reference, price, active)))
            .collect();

        items
            .iter()
            .map(|item| {
                let (reference, price, active) = products
                    .get(&item.product_id)
                    .ok_or_else(|| AppError::NotFound(format!("Product {}", item.product_id)))?;
                if !active {
                    return Err(AppError::validation(
                        "items",
                        format!("Product {} is archived and cannot be ordered", reference),
                    ));
                }
                Ok(OrderLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.unwrap_or(*price),
                })
            })
            .collect()
    }

    async fn ensure_customer(&self, customer_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM customers WHERE id = $1)",
        )
        .bind(customer_id)
        .fetch_one(&self.db)
        .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound("Customer".to_string()))
        }
    }

    /// Create a draft order, then move it to the requested status if any
    pub async fn create_order(
        &self,
        input: CreateOrderInput,
        actor: &Actor,
    ) -> AppResult<StatusChangeResult> {
        input.validate()?;
        self.ensure_customer(input.customer_id).await?;
        let lines = self.resolve_lines(&input.items).await?;

        let mut tx = self.db.begin().await?;

        let sequence = sqlx::query_scalar::<_, i64>("SELECT nextval('order_number_seq')")
            .fetch_one(&mut *tx)
            .await?;
        let order_number = format_order_number(Utc::now().year(), sequence);
        let order_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, status, delivery_date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(order_id)
        .bind(&order_number)
        .bind(input.customer_id)
        .bind(OrderStatus::Draft.as_str())
        .bind(input.delivery_date)
        .execute(&mut *tx)
        .await?;

        write_lines(&mut tx, order_id, &lines).await?;

        let target = input.status.unwrap_or(OrderStatus::Draft);
        let outcome = apply_transition(&mut tx, order_id, target, actor).await?;

        tx.commit().await?;

        tracing::info!(order_number = %order_number, status = target.as_str(), "Order created");

        Ok(StatusChangeResult {
            order: self.get_order(order_id).await?,
            outcome,
        })
    }

    /// Update customer, delivery date and, on drafts, the lines
    pub async fn update_order(
        &self,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<OrderDetail> {
        input.validate()?;
        if let Some(customer_id) = input.customer_id {
            self.ensure_customer(customer_id).await?;
        }
        let lines = match &input.items {
            Some(items) => Some(self.resolve_lines(items).await?),
            None => None,
        };

        let mut tx = self.db.begin().await?;

        let locked = lock_order(&mut tx, order_id).await?;
        let status = locked.status.parse::<OrderStatus>()?;
        if lines.is_some() && !can_replace_lines(status, locked.stock_debited) {
            return Err(AppError::InvalidStateTransition(format!(
                "Lines of order {} can only be changed on a draft holding no stock (current status: {})",
                locked.order_number,
                status.as_str()
            )));
        }

        sqlx::query(
            r#"
            UPDATE orders
            SET customer_id = COALESCE($2, customer_id),
                delivery_date = COALESCE($3, delivery_date),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(input.customer_id)
        .bind(input.delivery_date)
        .execute(&mut *tx)
        .await?;

        if let Some(lines) = &lines {
            write_lines(&mut tx, order_id, lines).await?;
        }

        tx.commit().await?;

        self.get_order(order_id).await
    }

    /// Change the status of an order with its stock effect
    pub async fn change_status(
        &self,
        order_id: Uuid,
        input: ChangeStatusInput,
        actor: &Actor,
    ) -> AppResult<StatusChangeResult> {
        let mut tx = self.db.begin().await?;
        let outcome = apply_transition(&mut tx, order_id, input.status, actor).await?;
        tx.commit().await?;

        Ok(StatusChangeResult {
            order: self.get_order(order_id).await?,
            outcome,
        })
    }

    /// Delete an order that does not hold stock for production
    pub async fn delete_order(&self, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let locked = lock_order(&mut tx, order_id).await?;
        let status = locked.status.parse::<OrderStatus>()?;
        if !can_delete(locked.stock_debited) {
            return Err(AppError::conflict(
                "order",
                format!(
                    "Order {} holds stock while {}; cancel it before deleting",
                    locked.order_number,
                    status.as_str()
                ),
            ));
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(order_number = %locked.order_number, "Order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_statuses_match_delay_rule() {
        let open = open_statuses();
        assert_eq!(open, vec!["draft", "confirmed", "in_production"]);
    }
}
