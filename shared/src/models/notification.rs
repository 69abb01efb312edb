//! Notification models and message builders

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Notification categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DelayedOrder,
    UpcomingDelivery,
    LowStock,
    System,
    Info,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::DelayedOrder => "delayed_order",
            NotificationType::UpcomingDelivery => "upcoming_delivery",
            NotificationType::LowStock => "low_stock",
            NotificationType::System => "system",
            NotificationType::Info => "info",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown notification type: {0}")]
pub struct UnknownNotificationType(pub String);

impl FromStr for NotificationType {
    type Err = UnknownNotificationType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "delayed_order" => Ok(NotificationType::DelayedOrder),
            "upcoming_delivery" => Ok(NotificationType::UpcomingDelivery),
            "low_stock" => Ok(NotificationType::LowStock),
            "system" => Ok(NotificationType::System),
            "info" => Ok(NotificationType::Info),
            other => Err(UnknownNotificationType(other.to_string())),
        }
    }
}

/// A notification ready to be stored for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationDraft {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub related_order_id: Option<Uuid>,
}

/// Delivery falls between today and `window_days` from now, inclusive
pub fn is_upcoming(delivery_date: NaiveDate, today: NaiveDate, window_days: i64) -> bool {
    let days_left = (delivery_date - today).num_days();
    (0..=window_days).contains(&days_left)
}

pub fn delayed_order_notice(
    order_id: Uuid,
    order_number: &str,
    delivery_date: NaiveDate,
    today: NaiveDate,
) -> NotificationDraft {
    let days_late = (today - delivery_date).num_days();
    NotificationDraft {
        notification_type: NotificationType::DelayedOrder,
        title: "Delayed order".to_string(),
        message: format!(
            "Order {} is {} day(s) late. Planned delivery: {}",
            order_number,
            days_late,
            delivery_date.format("%Y-%m-%d")
        ),
        related_order_id: Some(order_id),
    }
}

pub fn upcoming_delivery_notice(
    order_id: Uuid,
    order_number: &str,
    delivery_date: NaiveDate,
    today: NaiveDate,
) -> NotificationDraft {
    let days_left = (delivery_date - today).num_days();
    NotificationDraft {
        notification_type: NotificationType::UpcomingDelivery,
        title: "Upcoming delivery".to_string(),
        message: format!(
            "Order {} is due in {} day(s). Delivery date: {}",
            order_number,
            days_left,
            delivery_date.format("%Y-%m-%d")
        ),
        related_order_id: Some(order_id),
    }
}

/// One summary notice for every product at or below its minimum stock.
///
/// Names the first `preview` references and counts the rest. Returns `None`
/// when nothing is low.
pub fn low_stock_notice(references: &[String], preview: usize) -> Option<NotificationDraft> {
    if references.is_empty() {
        return None;
    }

    let shown = references.iter().take(preview).cloned().collect::<Vec<_>>().join(", ");
    let hidden = references.len().saturating_sub(preview);
    let extra = if hidden > 0 {
        format!(" and {} others", hidden)
    } else {
        String::new()
    };

    Some(NotificationDraft {
        notification_type: NotificationType::LowStock,
        title: "Low stock".to_string(),
        message: format!(
            "{} product(s) need restocking: {}{}",
            references.len(),
            shown,
            extra
        ),
        related_order_id: None,
    })
}
