//! HTTP handlers for the planning calendar

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::services::planning::{
    CreateEventInput, ListEventsQuery, PlanningEventView, PlanningOverview, PlanningService,
};
use crate::AppState;

/// Planning board
pub async fn get_planning_overview(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<PlanningOverview>> {
    let service = PlanningService::new(state.db, &state.config);
    let overview = service.overview().await?;
    Ok(Json(overview))
}

/// List planning events
pub async fn list_events(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListEventsQuery>,
) -> AppResult<Json<Vec<PlanningEventView>>> {
    let service = PlanningService::new(state.db, &state.config);
    let events = service.list_events(query).await?;
    Ok(Json(events))
}

/// Add a planning event
pub async fn add_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<CreateEventInput>,
) -> AppResult<(StatusCode, Json<PlanningEventView>)> {
    let service = PlanningService::new(state.db, &state.config);
    let event = service.add_event(user.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// Delete a planning event
pub async fn delete_event(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;

    let service = PlanningService::new(state.db, &state.config);
    service.delete_event(event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
