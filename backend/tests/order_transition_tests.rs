//! Order status and stock tests
//!
//! Drives the same planners and guards the order service uses against an
//! in-memory stock book:
//! - Confirmation debits each line and writes one "out" movement per line
//! - A short confirmation leaves every product untouched
//! - Cancellation gives back what confirmation took
//! - Order totals are the sum of the line totals
//! - Only confirmed or in-production orders hold stock, so line edits,
//!   deletions and status walks can neither create nor lose goods

use std::collections::BTreeMap;
use std::str::FromStr;

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    aggregate_demand, can_delete, can_replace_lines, order_total, plan_stock_changes,
    plan_stock_effect, HeldStockTransition, MovementType, OrderLine, OrderStatus, StockChange,
    StockEffect, StockError, StockLevel,
};
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn product_id(index: usize) -> Uuid {
    Uuid::from_u128(index as u128 + 1)
}

/// Products, their movement journal and what left with shipped orders
#[derive(Debug, Clone)]
struct StockBook {
    levels: BTreeMap<Uuid, StockLevel>,
    initial: BTreeMap<Uuid, i32>,
    movements: Vec<(usize, StockChange)>,
    shipped: BTreeMap<Uuid, i64>,
}

impl StockBook {
    fn new(stocks: &[i32]) -> Self {
        let levels: BTreeMap<Uuid, StockLevel> = stocks
            .iter()
            .enumerate()
            .map(|(i, stock)| {
                let id = product_id(i);
                (
                    id,
                    StockLevel {
                        product_id: id,
                        reference: format!("P-{:03}", i + 1),
                        current_stock: *stock,
                    },
                )
            })
            .collect();
        let initial = levels.iter().map(|(id, l)| (*id, l.current_stock)).collect();
        Self {
            levels,
            initial,
            movements: Vec::new(),
            shipped: BTreeMap::new(),
        }
    }

    fn stock(&self, id: Uuid) -> i32 {
        self.levels[&id].current_stock
    }

    fn snapshot(&self) -> BTreeMap<Uuid, i32> {
        self.levels.iter().map(|(id, l)| (*id, l.current_stock)).collect()
    }
}

#[derive(Debug, Clone)]
struct TestOrder {
    status: OrderStatus,
    stock_debited: bool,
    lines: Vec<OrderLine>,
    deleted: bool,
}

impl TestOrder {
    fn draft(lines: Vec<OrderLine>) -> Self {
        Self {
            status: OrderStatus::Draft,
            stock_debited: false,
            lines,
            deleted: false,
        }
    }
}

#[derive(Debug)]
enum Refused {
    HeldStock(HeldStockTransition),
    Stock(StockError),
}

/// Same steps as the service transaction: plan the effect, plan the
/// changes against the locked levels, then write levels and movements.
fn change_status(
    book: &mut StockBook,
    order_index: usize,
    order: &mut TestOrder,
    to: OrderStatus,
) -> Result<Vec<StockChange>, Refused> {
    let effect =
        plan_stock_effect(order.status, to, order.stock_debited).map_err(Refused::HeldStock)?;
    let changes = plan_stock_changes(effect, &order.lines, &book.levels).map_err(Refused::Stock)?;

    for change in &changes {
        if let Some(level) = book.levels.get_mut(&change.product_id) {
            level.current_stock = change.stock_after;
        }
        book.movements.push((order_index, change.clone()));
    }

    if effect == StockEffect::Consume {
        for (id, qty) in aggregate_demand(&order.lines) {
            *book.shipped.entry(id).or_insert(0) += qty;
        }
    }

    order.stock_debited = effect.holds_stock_after(order.stock_debited);
    order.status = to;
    Ok(changes)
}

/// Line replacement as `update_order` allows it
fn replace_lines(order: &mut TestOrder, lines: Vec<OrderLine>) -> bool {
    if can_replace_lines(order.status, order.stock_debited) {
        order.lines = lines;
        true
    } else {
        false
    }
}

/// Deletion as `delete_order` allows it
fn delete(order: &mut TestOrder) -> bool {
    if can_delete(order.stock_debited) {
        order.deleted = true;
        true
    } else {
        false
    }
}

fn line(index: usize, quantity: i32, price: &str) -> OrderLine {
    OrderLine {
        product_id: product_id(index),
        quantity,
        unit_price: dec(price),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_confirm_then_cancel_round_trip() {
        let mut book = StockBook::new(&[10, 4]);
        let mut order = TestOrder::draft(vec![line(0, 3, "12.50"), line(1, 4, "8.00")]);

        let out = change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(book.stock(product_id(0)), 7);
        assert_eq!(book.stock(product_id(1)), 0);
        assert!(order.stock_debited);

        change_status(&mut book, 0, &mut order, OrderStatus::InProduction).unwrap();
        let back = change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.iter().all(|c| c.movement_type == MovementType::In));
        assert_eq!(book.stock(product_id(0)), 10);
        assert_eq!(book.stock(product_id(1)), 4);
        assert!(!order.stock_debited);
    }

    #[test]
    fn test_short_confirmation_keeps_order_in_draft() {
        let mut book = StockBook::new(&[10, 2]);
        let mut order = TestOrder::draft(vec![line(0, 3, "1.00"), line(1, 5, "1.00")]);

        let err = change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap_err();
        match err {
            Refused::Stock(StockError::Insufficient(shortfalls)) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].reference, "P-002");
                assert_eq!(shortfalls[0].missing(), 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert_eq!(order.status, OrderStatus::Draft);
        assert!(book.movements.is_empty());
        assert_eq!(book.stock(product_id(0)), 10);
    }

    #[test]
    fn test_shipping_consumes_the_debit() {
        let mut book = StockBook::new(&[5]);
        let mut order = TestOrder::draft(vec![line(0, 5, "3.00")]);

        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        change_status(&mut book, 0, &mut order, OrderStatus::Shipped).unwrap();
        assert!(!order.stock_debited);
        change_status(&mut book, 0, &mut order, OrderStatus::Delivered).unwrap();

        assert_eq!(book.stock(product_id(0)), 0);
        assert_eq!(book.movements.len(), 1);
    }

    #[test]
    fn test_confirmed_order_cannot_go_back_to_draft_and_swap_lines() {
        let mut book = StockBook::new(&[10]);
        let mut order = TestOrder::draft(vec![line(0, 2, "1.00")]);

        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        let err = change_status(&mut book, 0, &mut order, OrderStatus::Draft).unwrap_err();
        assert!(matches!(err, Refused::HeldStock(_)));
        assert_eq!(order.status, OrderStatus::Confirmed);

        assert!(!replace_lines(&mut order, vec![line(0, 50, "1.00")]));
        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();

        assert_eq!(book.stock(product_id(0)), 10);
    }

    #[test]
    fn test_order_holding_stock_cannot_be_deleted() {
        let mut book = StockBook::new(&[10]);
        let mut order = TestOrder::draft(vec![line(0, 2, "1.00")]);

        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        assert!(change_status(&mut book, 0, &mut order, OrderStatus::Draft).is_err());
        assert!(!delete(&mut order));

        change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();
        assert!(delete(&mut order));
        assert_eq!(book.stock(product_id(0)), 10);
    }

    #[test]
    fn test_shipped_goods_do_not_come_back() {
        let mut book = StockBook::new(&[10]);
        let mut order = TestOrder::draft(vec![line(0, 2, "1.00")]);

        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        change_status(&mut book, 0, &mut order, OrderStatus::Shipped).unwrap();
        change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();
        assert_eq!(book.stock(product_id(0)), 8);

        // A second confirmation is a fresh debit, and its cancel returns only that
        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
        assert_eq!(book.stock(product_id(0)), 6);
        change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();

        assert_eq!(book.stock(product_id(0)), 8);
    }

    #[test]
    fn test_draft_lines_replaced_before_confirmation() {
        let mut book = StockBook::new(&[10]);
        let mut order = TestOrder::draft(vec![line(0, 2, "1.00")]);

        assert!(replace_lines(&mut order, vec![line(0, 7, "1.00")]));
        change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();

        assert_eq!(book.stock(product_id(0)), 3);
    }

    #[test]
    fn test_two_lines_same_product_checked_together() {
        let mut book = StockBook::new(&[6]);
        let mut order = TestOrder::draft(vec![line(0, 4, "1.00"), line(0, 4, "1.00")]);

        assert!(change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).is_err());
        assert_eq!(book.stock(product_id(0)), 6);
    }

    #[test]
    fn test_order_total_to_the_cent() {
        let lines = vec![line(0, 3, "19.99"), line(1, 1, "0.01")];
        assert_eq!(order_total(&lines), dec("59.98"));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    const PRODUCTS: usize = 4;

    #[derive(Debug, Clone)]
    enum Step {
        Status(usize, OrderStatus),
        ReplaceLines(usize, Vec<OrderLine>),
        Delete(usize),
    }

    fn stocks_strategy() -> impl Strategy<Value = Vec<i32>> {
        prop::collection::vec(0i32..60, PRODUCTS)
    }

    fn line_strategy() -> impl Strategy<Value = OrderLine> {
        (0..PRODUCTS, 1i32..25, 1i64..100_000).prop_map(|(index, quantity, cents)| OrderLine {
            product_id: product_id(index),
            quantity,
            unit_price: Decimal::new(cents, 2),
        })
    }

    fn lines_strategy() -> impl Strategy<Value = Vec<OrderLine>> {
        prop::collection::vec(line_strategy(), 1..6)
    }

    fn status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    fn step_strategy() -> impl Strategy<Value = Step> {
        prop_oneof![
            6 => (0usize..4, status_strategy()).prop_map(|(i, s)| Step::Status(i, s)),
            2 => (0usize..4, lines_strategy()).prop_map(|(i, l)| Step::ReplaceLines(i, l)),
            1 => (0usize..4).prop_map(Step::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Confirming with enough stock debits each product by its line quantities
        #[test]
        fn prop_confirmation_debits_every_line(lines in lines_strategy()) {
            let demand = aggregate_demand(&lines);
            let stocks: Vec<i32> = (0..PRODUCTS)
                .map(|i| demand.get(&product_id(i)).copied().unwrap_or(0) as i32 + 3)
                .collect();
            let mut book = StockBook::new(&stocks);
            let before = book.snapshot();
            let mut order = TestOrder::draft(lines.clone());

            let changes = change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();

            prop_assert_eq!(changes.len(), lines.len());
            prop_assert!(changes.iter().all(|c| c.movement_type == MovementType::Out));
            for (change, line) in changes.iter().zip(&lines) {
                prop_assert_eq!(change.product_id, line.product_id);
                prop_assert_eq!(change.quantity, line.quantity);
            }
            for (id, stock) in before {
                let taken = demand.get(&id).copied().unwrap_or(0);
                prop_assert_eq!(i64::from(book.stock(id)), i64::from(stock) - taken);
            }
        }

        /// A confirmation that cannot be covered changes nothing
        #[test]
        fn prop_short_confirmation_leaves_stock_untouched(
            stocks in stocks_strategy(),
            lines in lines_strategy()
        ) {
            let demand = aggregate_demand(&lines);
            let short = demand
                .iter()
                .any(|(id, qty)| *qty > i64::from(stocks[(id.as_u128() - 1) as usize]));
            prop_assume!(short);

            let mut book = StockBook::new(&stocks);
            let before = book.snapshot();
            let mut order = TestOrder::draft(lines);

            let result = change_status(&mut book, 0, &mut order, OrderStatus::Confirmed);

            prop_assert!(matches!(result, Err(Refused::Stock(StockError::Insufficient(_)))));
            prop_assert_eq!(book.snapshot(), before);
            prop_assert!(book.movements.is_empty());
            prop_assert_eq!(order.status, OrderStatus::Draft);
        }

        /// Cancelling a confirmed order restores the pre-confirmation levels
        #[test]
        fn prop_cancel_restores_stock(
            lines in lines_strategy(),
            through_production in any::<bool>()
        ) {
            let stocks = vec![200; PRODUCTS];
            let mut book = StockBook::new(&stocks);
            let before = book.snapshot();
            let mut order = TestOrder::draft(lines);

            change_status(&mut book, 0, &mut order, OrderStatus::Confirmed).unwrap();
            if through_production {
                change_status(&mut book, 0, &mut order, OrderStatus::InProduction).unwrap();
            }
            change_status(&mut book, 0, &mut order, OrderStatus::Cancelled).unwrap();

            prop_assert_eq!(book.snapshot(), before);
            prop_assert!(!order.stock_debited);
        }

        /// Order total equals the sum of quantity × unit price
        #[test]
        fn prop_order_total_is_sum_of_lines(lines in lines_strategy()) {
            let expected: Decimal = lines
                .iter()
                .map(|l| Decimal::from(l.quantity) * l.unit_price)
                .sum();

            prop_assert_eq!(order_total(&lines), expected);
            prop_assert!(order_total(&lines) > Decimal::ZERO);
        }

        /// Any walk of status changes, line edits and deletions keeps every
        /// product at initial - held by open orders - shipped, where "held"
        /// is measured on each order's current lines
        #[test]
        fn prop_status_walk_conserves_stock(
            stocks in stocks_strategy(),
            orders in prop::collection::vec(lines_strategy(), 1..4),
            steps in prop::collection::vec(step_strategy(), 0..40)
        ) {
            let mut book = StockBook::new(&stocks);
            let mut orders: Vec<TestOrder> = orders.into_iter().map(TestOrder::draft).collect();

            for step in steps {
                match step {
                    Step::Status(pick, to) => {
                        let index = pick % orders.len();
                        if orders[index].deleted {
                            continue;
                        }
                        let before = book.snapshot();
                        let movements_before = book.movements.len();
                        let order_before = orders[index].clone();

                        if change_status(&mut book, index, &mut orders[index], to).is_err() {
                            prop_assert_eq!(book.snapshot(), before);
                            prop_assert_eq!(book.movements.len(), movements_before);
                            prop_assert_eq!(orders[index].status, order_before.status);
                            prop_assert_eq!(orders[index].stock_debited, order_before.stock_debited);
                        }
                    }
                    Step::ReplaceLines(pick, lines) => {
                        let index = pick % orders.len();
                        if !orders[index].deleted {
                            replace_lines(&mut orders[index], lines);
                        }
                    }
                    Step::Delete(pick) => {
                        let index = pick % orders.len();
                        if !orders[index].deleted {
                            delete(&mut orders[index]);
                        }
                    }
                }

                for order in &orders {
                    if order.stock_debited {
                        prop_assert!(order.status.is_scheduled());
                        prop_assert!(!order.deleted);
                    }
                }

                let mut held: BTreeMap<Uuid, i64> = BTreeMap::new();
                for order in orders.iter().filter(|o| o.stock_debited) {
                    for (id, qty) in aggregate_demand(&order.lines) {
                        *held.entry(id).or_insert(0) += qty;
                    }
                }

                for (id, initial) in &book.initial {
                    let stock = i64::from(book.stock(*id));
                    prop_assert!(stock >= 0);
                    let expected = i64::from(*initial)
                        - held.get(id).copied().unwrap_or(0)
                        - book.shipped.get(id).copied().unwrap_or(0);
                    prop_assert_eq!(stock, expected);
                }
            }

            // The journal agrees with the levels
            for (id, initial) in &book.initial {
                let net: i64 = book
                    .movements
                    .iter()
                    .filter(|(_, c)| c.product_id == *id)
                    .map(|(_, c)| match c.movement_type {
                        MovementType::Out => -i64::from(c.quantity),
                        _ => i64::from(c.quantity),
                    })
                    .sum();
                prop_assert_eq!(i64::from(book.stock(*id)), i64::from(*initial) + net);
            }
        }
    }
}
