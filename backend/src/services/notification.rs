//! Notification service
//!
//! In-app notifications per user, plus the checks that raise them for
//! delayed orders, upcoming deliveries and low stock.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use shared::{
    delayed_order_notice, is_upcoming, low_stock_notice, upcoming_delivery_notice,
    NotificationDraft, NotificationType, OrderStatus,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Notification service for in-app alerts
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    upcoming_window_days: i64,
    low_stock_preview: usize,
}

/// Notification record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: String,
    pub related_order_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for listing notifications
#[derive(Debug, Default, Deserialize)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub notification_type: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, FromRow)]
struct DueOrder {
    id: Uuid,
    order_number: String,
    delivery_date: NaiveDate,
}

fn type_filter(raw: Option<&str>) -> AppResult<Option<NotificationType>> {
    raw.filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<NotificationType>()
                .map_err(|e| AppError::validation("notification_type", e.to_string()))
        })
        .transpose()
}

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, title, message, notification_type, related_order_id, is_read, created_at";

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            upcoming_window_days: config.notifications.upcoming_window_days,
            low_stock_preview: config.notifications.low_stock_preview,
        }
    }

    // ========================================================================
    // In-App Notifications
    // ========================================================================

    /// Notifications of a user, newest first
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        query: ListNotificationsQuery,
    ) -> AppResult<Vec<Notification>> {
        let notification_type = type_filter(query.notification_type.as_deref())?;

        let notifications = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE user_id = $1
              AND (NOT $2 OR is_read = false)
              AND ($3::text IS NULL OR notification_type = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(user_id)
        .bind(query.unread_only.unwrap_or(false))
        .bind(notification_type.map(|t| t.as_str()))
        .bind(shared::clamp_limit(query.limit))
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    /// Get unread notification count
    pub async fn get_unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count)
    }

    /// Mark notification as read
    pub async fn mark_as_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Notification".to_string()));
        }

        Ok(())
    }

    /// Mark all notifications as read
    pub async fn mark_all_as_read(&self, user_id: Uuid) -> AppResult<i64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = true WHERE user_id = $1 AND is_read = false",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() as i64)
    }

    /// Store a notification unless the same one is already waiting unread
    async fn store(&self, user_id: Uuid, draft: NotificationDraft) -> AppResult<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, user_id, title, message, notification_type, related_order_id)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (
                SELECT 1 FROM notifications
                WHERE user_id = $2
                  AND is_read = false
                  AND notification_type = $5
                  AND related_order_id IS NOT DISTINCT FROM $6
                  AND message = $4
            )
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.message)
        .bind(draft.notification_type.as_str())
        .bind(draft.related_order_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(notification)
    }

    // ========================================================================
    // Notification Triggers
    // ========================================================================

    /// Build the notices that apply today
    async fn collect_drafts(&self, today: NaiveDate) -> AppResult<Vec<NotificationDraft>> {
        let mut drafts = Vec::new();

        let delayed = sqlx::query_as::<_, DueOrder>(
            r#"
            SELECT id, order_number, delivery_date
            FROM orders
            WHERE delivery_date < $1 AND status IN ('draft', 'confirmed', 'in_production')
            ORDER BY delivery_date, order_number
            "#,
        )
        .bind(today)
        .fetch_all(&self.db)
        .await?;
        drafts.extend(delayed.iter().map(|order| {
            delayed_order_notice(order.id, &order.order_number, order.delivery_date, today)
        }));

        let scheduled = sqlx::query_as::<_, DueOrder>(
            r#"
            SELECT id, order_number, delivery_date
            FROM orders
            WHERE delivery_date >= $1 AND status = ANY($2)
            ORDER BY delivery_date, order_number
            "#,
        )
        .bind(today)
        .bind(vec![
            OrderStatus::Confirmed.as_str(),
            OrderStatus::InProduction.as_str(),
        ])
        .fetch_all(&self.db)
        .await?;
        drafts.extend(
            scheduled
                .iter()
                .filter(|order| is_upcoming(order.delivery_date, today, self.upcoming_window_days))
                .map(|order| {
                    upcoming_delivery_notice(order.id, &order.order_number, order.delivery_date, today)
                }),
        );

        let low_stock = sqlx::query_scalar::<_, String>(
            r#"
            SELECT reference
            FROM products
            WHERE is_active AND current_stock <= min_stock
            ORDER BY reference
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        drafts.extend(low_stock_notice(&low_stock, self.low_stock_preview));

        Ok(drafts)
    }

    /// Run every check for a user and return the notifications created
    pub async fn generate(&self, user_id: Uuid) -> AppResult<Vec<Notification>> {
        let today = Utc::now().date_naive();
        let drafts = self.collect_drafts(today).await?;

        let mut created = Vec::new();
        for draft in drafts {
            if let Some(notification) = self.store(user_id, draft).await? {
                created.push(notification);
            }
        }

        tracing::info!(user_id = %user_id, created = created.len(), "Notifications generated");
        Ok(created)
    }
}
