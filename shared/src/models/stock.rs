//! Stock movement models and the arithmetic behind every stock change

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Kind of stock movement recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Goods received or returned to stock
    In,
    /// Goods leaving stock
    Out,
    /// Stock set to an absolute level after a count
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementType::In => write!(f, "In"),
            MovementType::Out => write!(f, "Out"),
            MovementType::Adjustment => write!(f, "Adjustment"),
        }
    }
}

impl FromStr for MovementType {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(MovementType::In),
            "out" => Ok(MovementType::Out),
            "adjustment" => Ok(MovementType::Adjustment),
            other => Err(StockError::UnknownMovementType(other.to_string())),
        }
    }
}

/// How a manual "out" larger than the available stock is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutPolicy {
    /// Remove what is there and stop at zero
    #[default]
    Clamp,
    /// Refuse the movement
    Reject,
}

/// Current stock of one product, as read under lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: Uuid,
    pub reference: String,
    pub current_stock: i32,
}

/// A single planned stock change, ready to be written with its movement row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockChange {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Quantity recorded on the movement. For adjustments this is the new level.
    pub quantity: i32,
    pub stock_before: i32,
    pub stock_after: i32,
}

impl StockChange {
    /// Signed change applied to the product
    pub fn delta(&self) -> i32 {
        self.stock_after - self.stock_before
    }
}

/// A product that cannot cover the requested quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub product_id: Uuid,
    pub reference: String,
    pub requested: i64,
    pub available: i64,
}

impl Shortfall {
    pub fn missing(&self) -> i64 {
        self.requested - self.available
    }
}

/// Errors raised by the stock rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("quantity must be positive")]
    NonPositiveQuantity,

    #[error("stock level cannot be negative")]
    NegativeLevel,

    #[error("insufficient stock for {}", describe_shortfalls(.0))]
    Insufficient(Vec<Shortfall>),

    #[error("product {0} is not part of the stock snapshot")]
    UnknownProduct(Uuid),

    #[error("unknown movement type: {0}")]
    UnknownMovementType(String),

    #[error("stock quantity out of range")]
    Overflow,
}

/// Render shortfalls as "REF (requested 5, available 2)" joined by commas
pub fn describe_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| {
            format!(
                "{} (requested {}, available {})",
                s.reference, s.requested, s.available
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Plan a manual stock movement against the current level.
///
/// `In` adds the quantity. `Out` removes it; when it exceeds the stock the
/// policy decides between stopping at zero (the change then records what was
/// actually removed) and refusing. `Adjustment` sets the level to `quantity`.
pub fn plan_manual_movement(
    level: &StockLevel,
    movement_type: MovementType,
    quantity: i32,
    policy: OutPolicy,
) -> Result<StockChange, StockError> {
    let before = level.current_stock;

    let (recorded, after) = match movement_type {
        MovementType::In => {
            if quantity <= 0 {
                return Err(StockError::NonPositiveQuantity);
            }
            let after = before.checked_add(quantity).ok_or(StockError::Overflow)?;
            (quantity, after)
        }
        MovementType::Out => {
            if quantity <= 0 {
                return Err(StockError::NonPositiveQuantity);
            }
            let removed = if quantity > before {
                match policy {
                    OutPolicy::Clamp => before,
                    OutPolicy::Reject => {
                        return Err(StockError::Insufficient(vec![Shortfall {
                            product_id: level.product_id,
                            reference: level.reference.clone(),
                            requested: i64::from(quantity),
                            available: i64::from(before),
                        }]));
                    }
                }
            } else {
                quantity
            };
            (removed, before - removed)
        }
        MovementType::Adjustment => {
            if quantity < 0 {
                return Err(StockError::NegativeLevel);
            }
            (quantity, quantity)
        }
    };

    Ok(StockChange {
        product_id: level.product_id,
        movement_type,
        quantity: recorded,
        stock_before: before,
        stock_after: after,
    })
}
