//! Product catalogue rules

/// Default minimum stock threshold for new products
pub const DEFAULT_MIN_STOCK: i32 = 5;

/// Default maximum stock level for new products
pub const DEFAULT_MAX_STOCK: i32 = 100;

/// Low stock: current stock at or below the minimum threshold
pub fn is_low_stock(current_stock: i32, min_stock: i32) -> bool {
    current_stock <= min_stock
}

/// Canonical form of a product reference (trimmed, upper-case)
pub fn normalize_reference(raw: &str) -> String {
    raw.trim().to_uppercase()
}
