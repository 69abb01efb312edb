//! Order models and the status-driven stock rules
//!
//! An order takes stock when it is confirmed and gives it back when a
//! confirmed or in-production order is cancelled. The planner functions here
//! decide what a status change does to stock; the backend applies the result
//! inside a single database transaction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::stock::{MovementType, Shortfall, StockChange, StockError, StockLevel};

/// Lifecycle status of a customer order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    InProduction,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Draft,
        OrderStatus::Confirmed,
        OrderStatus::InProduction,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::InProduction => "in_production",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Not yet shipped, delivered or cancelled
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            OrderStatus::Draft | OrderStatus::Confirmed | OrderStatus::InProduction
        )
    }

    /// On the production schedule
    pub fn is_scheduled(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::InProduction)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, OrderStatus::Shipped | OrderStatus::Delivered)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Draft => write!(f, "Draft"),
            OrderStatus::Confirmed => write!(f, "Confirmed"),
            OrderStatus::InProduction => write!(f, "In production"),
            OrderStatus::Shipped => write!(f, "Shipped"),
            OrderStatus::Delivered => write!(f, "Delivered"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// A status string that is not one of the known order statuses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// What a status change does to stock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockEffect {
    /// Plain status write
    None,
    /// Take every line's quantity out of stock
    Debit,
    /// Put every line's quantity back
    Restore,
    /// The debited goods leave with the order; stock is not touched again
    Consume,
}

impl StockEffect {
    /// Whether the order holds stock once this effect has been applied
    pub fn holds_stock_after(self, held_before: bool) -> bool {
        match self {
            StockEffect::Debit => true,
            StockEffect::Restore | StockEffect::Consume => false,
            StockEffect::None => held_before,
        }
    }
}

/// A status change that would strand the stock an order holds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("order holds stock while {}; cancel it before moving it to {}", .from.as_str(), .to.as_str())]
pub struct HeldStockTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

/// Decide the stock effect of moving an order from `from` to `to`.
///
/// `stock_debited` says whether the order currently holds stock, which is
/// only ever the case while it is confirmed or in production. Entering
/// `confirmed` takes stock and cancelling gives it back. Shipping or
/// delivering consumes it. Going back to draft while holding stock is refused.
pub fn plan_stock_effect(
    from: OrderStatus,
    to: OrderStatus,
    stock_debited: bool,
) -> Result<StockEffect, HeldStockTransition> {
    if from == to {
        return Ok(StockEffect::None);
    }

    if stock_debited {
        return match to {
            OrderStatus::Confirmed | OrderStatus::InProduction => Ok(StockEffect::None),
            OrderStatus::Cancelled => Ok(StockEffect::Restore),
            OrderStatus::Shipped | OrderStatus::Delivered => Ok(StockEffect::Consume),
            OrderStatus::Draft => Err(HeldStockTransition { from, to }),
        };
    }

    Ok(match to {
        OrderStatus::Confirmed => StockEffect::Debit,
        _ => StockEffect::None,
    })
}

/// Lines may be replaced on drafts that hold no stock
pub fn can_replace_lines(status: OrderStatus, stock_debited: bool) -> bool {
    status == OrderStatus::Draft && !stock_debited
}

/// An order holding stock has to be cancelled or shipped before deletion
pub fn can_delete(stock_debited: bool) -> bool {
    !stock_debited
}

/// One order line as far as stock and totals are concerned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderLine {
    /// Line total before VAT
    pub fn total(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

/// Order total before VAT: sum of quantity × unit price, to the cent
pub fn order_total(lines: &[OrderLine]) -> Decimal {
    lines.iter().map(OrderLine::total).sum::<Decimal>().round_dp(2)
}

pub fn vat_amount(total: Decimal, vat_rate: Decimal) -> Decimal {
    (total * vat_rate).round_dp(2)
}

pub fn total_with_vat(total: Decimal, vat_rate: Decimal) -> Decimal {
    total + vat_amount(total, vat_rate)
}

/// Generate an order number (e.g., "CMD-2024-0007")
pub fn format_order_number(year: i32, sequence: i64) -> String {
    format!("CMD-{}-{:04}", year, sequence)
}

/// An open order whose delivery date has passed
pub fn is_delayed(status: OrderStatus, delivery_date: NaiveDate, today: NaiveDate) -> bool {
    status.is_open() && delivery_date < today
}

/// Total requested quantity per product, ordered by product id
pub fn aggregate_demand(lines: &[OrderLine]) -> BTreeMap<Uuid, i64> {
    let mut demand = BTreeMap::new();
    for line in lines {
        *demand.entry(line.product_id).or_insert(0) += i64::from(line.quantity);
    }
    demand
}

/// Plan the stock changes for an effect over the given lines.
///
/// A debit is checked against the summed demand per product first; if any
/// product falls short nothing is planned and every shortfall is reported.
/// Otherwise one change is produced per line, in line order, with running
/// before/after levels.
pub fn plan_stock_changes(
    effect: StockEffect,
    lines: &[OrderLine],
    levels: &BTreeMap<Uuid, StockLevel>,
) -> Result<Vec<StockChange>, StockError> {
    let movement_type = match effect {
        StockEffect::None | StockEffect::Consume => return Ok(Vec::new()),
        StockEffect::Debit => MovementType::Out,
        StockEffect::Restore => MovementType::In,
    };

    if lines.iter().any(|line| line.quantity <= 0) {
        return Err(StockError::NonPositiveQuantity);
    }

    let demand = aggregate_demand(lines);
    if let Some(missing) = demand.keys().find(|id| !levels.contains_key(id)) {
        return Err(StockError::UnknownProduct(*missing));
    }

    if effect == StockEffect::Debit {
        let shortfalls: Vec<Shortfall> = demand
            .iter()
            .filter_map(|(product_id, requested)| {
                let level = levels.get(product_id)?;
                let available = i64::from(level.current_stock);
                (*requested > available).then(|| Shortfall {
                    product_id: *product_id,
                    reference: level.reference.clone(),
                    requested: *requested,
                    available,
                })
            })
            .collect();

        if !shortfalls.is_empty() {
            return Err(StockError::Insufficient(shortfalls));
        }
    }

    let mut running: BTreeMap<Uuid, i32> = levels
        .iter()
        .map(|(id, level)| (*id, level.current_stock))
        .collect();

    let mut changes = Vec::with_capacity(lines.len());
    for line in lines {
        let current = running
            .get_mut(&line.product_id)
            .ok_or(StockError::UnknownProduct(line.product_id))?;
        let before = *current;
        let after = match movement_type {
            MovementType::Out => before.checked_sub(line.quantity),
            _ => before.checked_add(line.quantity),
        }
        .ok_or(StockError::Overflow)?;
        *current = after;

        changes.push(StockChange {
            product_id: line.product_id,
            movement_type,
            quantity: line.quantity,
            stock_before: before,
            stock_after: after,
        });
    }

    Ok(changes)
}

/// Order counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub confirmed: i64,
    pub in_production: i64,
    pub shipped: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

impl StatusCounts {
    pub fn record(&mut self, status: OrderStatus, count: i64) {
        let slot = match status {
            OrderStatus::Draft => &mut self.draft,
            OrderStatus::Confirmed => &mut self.confirmed,
            OrderStatus::InProduction => &mut self.in_production,
            OrderStatus::Shipped => &mut self.shipped,
            OrderStatus::Delivered => &mut self.delivered,
            OrderStatus::Cancelled => &mut self.cancelled,
        };
        *slot += count;
    }

    pub fn total(&self) -> i64 {
        self.draft
            + self.confirmed
            + self.in_production
            + self.shipped
            + self.delivered
            + self.cancelled
    }

    pub fn scheduled(&self) -> i64 {
        self.confirmed + self.in_production
    }

    pub fn completed(&self) -> i64 {
        self.shipped + self.delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn level(id: Uuid, reference: &str, stock: i32) -> (Uuid, StockLevel) {
        (
            id,
            StockLevel {
                product_id: id,
                reference: reference.to_string(),
                current_stock: stock,
            },
        )
    }

    fn line(product_id: Uuid, quantity: i32) -> OrderLine {
        OrderLine {
            product_id,
            quantity,
            unit_price: dec("10.00"),
        }
    }

    #[test]
    fn test_status_strings() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(
            OrderStatus::from_str("archived"),
            Err(UnknownStatus("archived".to_string()))
        );
    }

    fn effect(from: OrderStatus, to: OrderStatus, held: bool) -> StockEffect {
        plan_stock_effect(from, to, held).unwrap()
    }

    #[test]
    fn test_confirm_from_draft_debits() {
        assert_eq!(effect(OrderStatus::Draft, OrderStatus::Confirmed, false), StockEffect::Debit);
    }

    #[test]
    fn test_confirm_after_cancel_debits_again() {
        assert_eq!(effect(OrderStatus::Cancelled, OrderStatus::Confirmed, false), StockEffect::Debit);
    }

    #[test]
    fn test_confirm_after_shipping_debits_again() {
        // Shipping consumed the first debit
        assert_eq!(effect(OrderStatus::Confirmed, OrderStatus::Shipped, true), StockEffect::Consume);
        assert!(!StockEffect::Consume.holds_stock_after(true));
        assert_eq!(effect(OrderStatus::Shipped, OrderStatus::Confirmed, false), StockEffect::Debit);
    }

    #[test]
    fn test_reconfirm_from_production_does_not_debit_twice() {
        assert_eq!(effect(OrderStatus::InProduction, OrderStatus::Confirmed, true), StockEffect::None);
    }

    #[test]
    fn test_cancel_restores_orders_holding_stock() {
        assert_eq!(effect(OrderStatus::Confirmed, OrderStatus::Cancelled, true), StockEffect::Restore);
        assert_eq!(effect(OrderStatus::InProduction, OrderStatus::Cancelled, true), StockEffect::Restore);
        assert_eq!(effect(OrderStatus::InProduction, OrderStatus::Cancelled, false), StockEffect::None);
        assert_eq!(effect(OrderStatus::Shipped, OrderStatus::Cancelled, false), StockEffect::None);
        assert_eq!(effect(OrderStatus::Draft, OrderStatus::Cancelled, false), StockEffect::None);
    }

    #[test]
    fn test_back_to_draft_refused_while_holding_stock() {
        for from in [OrderStatus::Confirmed, OrderStatus::InProduction] {
            assert_eq!(
                plan_stock_effect(from, OrderStatus::Draft, true),
                Err(HeldStockTransition { from, to: OrderStatus::Draft })
            );
        }
        assert_eq!(effect(OrderStatus::Confirmed, OrderStatus::Draft, false), StockEffect::None);
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in OrderStatus::ALL {
            assert_eq!(effect(status, status, false), StockEffect::None);
            assert_eq!(effect(status, status, true), StockEffect::None);
        }
    }

    #[test]
    fn test_holds_stock_after() {
        assert!(StockEffect::Debit.holds_stock_after(false));
        assert!(!StockEffect::Restore.holds_stock_after(true));
        assert!(!StockEffect::Consume.holds_stock_after(true));
        assert!(StockEffect::None.holds_stock_after(true));
        assert!(!StockEffect::None.holds_stock_after(false));
    }

    #[test]
    fn test_edit_and_delete_guards() {
        assert!(can_replace_lines(OrderStatus::Draft, false));
        assert!(!can_replace_lines(OrderStatus::Draft, true));
        assert!(!can_replace_lines(OrderStatus::Confirmed, false));
        assert!(can_delete(false));
        assert!(!can_delete(true));
    }

    #[test]
    fn test_debit_plans_one_change_per_line() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let levels: BTreeMap<_, _> = [level(a, "A", 10), level(b, "B", 4)].into_iter().collect();
        let lines = vec![line(a, 3), line(b, 4), line(a, 2)];

        let changes = plan_stock_changes(StockEffect::Debit, &lines, &levels).unwrap();

        assert_eq!(changes.len(), 3);
        assert!(changes.iter().all(|c| c.movement_type == MovementType::Out));
        assert_eq!((changes[0].stock_before, changes[0].stock_after), (10, 7));
        assert_eq!((changes[1].stock_before, changes[1].stock_after), (4, 0));
        assert_eq!((changes[2].stock_before, changes[2].stock_after), (7, 5));
    }

    #[test]
    fn test_debit_checks_summed_demand_per_product() {
        let a = Uuid::new_v4();
        let levels: BTreeMap<_, _> = [level(a, "A", 5)].into_iter().collect();
        // Each line fits on its own, together they do not
        let lines = vec![line(a, 3), line(a, 3)];

        let err = plan_stock_changes(StockEffect::Debit, &lines, &levels).unwrap_err();
        assert_eq!(
            err,
            StockError::Insufficient(vec![Shortfall {
                product_id: a,
                reference: "A".to_string(),
                requested: 6,
                available: 5,
            }])
        );
    }

    #[test]
    fn test_debit_reports_every_shortfall() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let levels: BTreeMap<_, _> =
            [level(a, "A", 1), level(b, "B", 100), level(c, "C", 0)].into_iter().collect();
        let lines = vec![line(a, 2), line(b, 1), line(c, 1)];

        match plan_stock_changes(StockEffect::Debit, &lines, &levels) {
            Err(StockError::Insufficient(shortfalls)) => {
                let refs: Vec<_> = shortfalls.iter().map(|s| s.reference.as_str()).collect();
                assert_eq!(shortfalls.len(), 2);
                assert!(refs.contains(&"A"));
                assert!(refs.contains(&"C"));
            }
            other => panic!("expected shortfalls, got {other:?}"),
        }
    }

    #[test]
    fn test_restore_credits_each_line() {
        let a = Uuid::new_v4();
        let levels: BTreeMap<_, _> = [level(a, "A", 0)].into_iter().collect();
        let lines = vec![line(a, 3), line(a, 2)];

        let changes = plan_stock_changes(StockEffect::Restore, &lines, &levels).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.movement_type == MovementType::In));
        assert_eq!(changes[1].stock_after, 5);
    }

    #[test]
    fn test_no_effect_plans_nothing() {
        let levels = BTreeMap::new();
        let lines = vec![line(Uuid::new_v4(), 3)];
        assert!(plan_stock_changes(StockEffect::None, &lines, &levels)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_missing_level_is_reported() {
        let a = Uuid::new_v4();
        let levels = BTreeMap::new();
        assert_eq!(
            plan_stock_changes(StockEffect::Debit, &[line(a, 1)], &levels),
            Err(StockError::UnknownProduct(a))
        );
    }

    #[test]
    fn test_order_total_and_vat() {
        let lines = vec![
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 3,
                unit_price: dec("12.50"),
            },
            OrderLine {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: dec("0.99"),
            },
        ];
        let total = order_total(&lines);
        assert_eq!(total, dec("39.48"));
        assert_eq!(vat_amount(total, dec("0.20")), dec("7.90"));
        assert_eq!(total_with_vat(total, dec("0.20")), dec("47.38"));
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(format_order_number(2024, 7), "CMD-2024-0007");
        assert_eq!(format_order_number(2025, 12345), "CMD-2025-12345");
    }

    #[test]
    fn test_delayed_orders() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let yesterday = NaiveDate::from_ymd_opt(2024, 6, 9).unwrap();
        assert!(is_delayed(OrderStatus::Confirmed, yesterday, today));
        assert!(is_delayed(OrderStatus::Draft, yesterday, today));
        assert!(!is_delayed(OrderStatus::Shipped, yesterday, today));
        assert!(!is_delayed(OrderStatus::Confirmed, today, today));
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.record(OrderStatus::Draft, 2);
        counts.record(OrderStatus::Confirmed, 3);
        counts.record(OrderStatus::InProduction, 1);
        counts.record(OrderStatus::Delivered, 4);
        assert_eq!(counts.total(), 10);
        assert_eq!(counts.scheduled(), 4);
        assert_eq!(counts.completed(), 4);
    }
}
