//! HTTP handlers for stock movement endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::services::stock::{
    AdjustStockInput, AdjustStockResult, ListMovementsQuery, MovementWithProduct, StockMovement,
    StockService,
};
use crate::services::Actor;
use crate::AppState;

/// Record a manual stock movement
pub async fn adjust_stock(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
    ApiJson(input): ApiJson<AdjustStockInput>,
) -> AppResult<Json<AdjustStockResult>> {
    user.require_manager()?;

    let service = StockService::new(state.db, &state.config);
    let result = service
        .adjust_stock(product_id, input, &Actor::from(&user))
        .await?;
    Ok(Json(result))
}

/// Movement journal
pub async fn list_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListMovementsQuery>,
) -> AppResult<Json<Vec<MovementWithProduct>>> {
    let service = StockService::new(state.db, &state.config);
    let movements = service.list_movements(query).await?;
    Ok(Json(movements))
}

/// Movements of one product
pub async fn get_product_movements(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = StockService::new(state.db, &state.config);
    let movements = service.product_movements(product_id).await?;
    Ok(Json(movements))
}
