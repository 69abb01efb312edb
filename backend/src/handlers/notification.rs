//! HTTP handlers for notification endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::notification::{ListNotificationsQuery, Notification, NotificationService};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkAllReadResponse {
    pub marked: i64,
}

/// Get notifications of the current user
pub async fn get_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListNotificationsQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let service = NotificationService::new(state.db, &state.config);
    let notifications = service.list_notifications(user.user_id, query).await?;
    Ok(Json(notifications))
}

/// Get unread notification count
pub async fn get_unread_count(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<UnreadCountResponse>> {
    let service = NotificationService::new(state.db, &state.config);
    let count = service.get_unread_count(user.user_id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// Mark a notification as read
pub async fn mark_as_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    let service = NotificationService::new(state.db, &state.config);
    service.mark_as_read(user.user_id, notification_id).await?;
    Ok(Json(()))
}

/// Mark all notifications as read
pub async fn mark_all_as_read(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<MarkAllReadResponse>> {
    let service = NotificationService::new(state.db, &state.config);
    let marked = service.mark_all_as_read(user.user_id).await?;
    Ok(Json(MarkAllReadResponse { marked }))
}

/// Run the delayed, upcoming and low stock checks
pub async fn generate_notifications(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<Json<Vec<Notification>>> {
    let service = NotificationService::new(state.db, &state.config);
    let created = service.generate(user.user_id).await?;
    Ok(Json(created))
}
