//! Dashboard handler

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::dashboard::{DashboardService, DashboardSummary};
use crate::AppState;

/// Landing page figures
pub async fn get_dashboard(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<DashboardSummary>> {
    let service = DashboardService::new(state.db, &state.config);
    let summary = service.summary().await?;
    Ok(Json(summary))
}
