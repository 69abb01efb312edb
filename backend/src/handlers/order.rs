//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::services::order::{
    ChangeStatusInput, CreateOrderInput, ListOrdersQuery, OrderDetail, OrderListItem,
    OrderService, OrderStats, StatusChangeResult, UpdateOrderInput,
};
use crate::services::Actor;
use crate::AppState;

/// List orders
pub async fn list_orders(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListOrdersQuery>,
) -> AppResult<Json<Vec<OrderListItem>>> {
    let service = OrderService::new(state.db, &state.config);
    let orders = service.list_orders(query).await?;
    Ok(Json(orders))
}

/// Order counts by status
pub async fn get_order_stats(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<OrderStats>> {
    let service = OrderService::new(state.db, &state.config);
    let stats = service.order_stats().await?;
    Ok(Json(stats))
}

/// Create an order
pub async fn create_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<StatusChangeResult>)> {
    let service = OrderService::new(state.db, &state.config);
    let result = service.create_order(input, &Actor::from(&user)).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Get an order with its lines
pub async fn get_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db, &state.config);
    let order = service.get_order(order_id).await?;
    Ok(Json(order))
}

/// Update an order
pub async fn update_order(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateOrderInput>,
) -> AppResult<Json<OrderDetail>> {
    let service = OrderService::new(state.db, &state.config);
    let order = service.update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Change the status of an order
pub async fn change_order_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
    ApiJson(input): ApiJson<ChangeStatusInput>,
) -> AppResult<Json<StatusChangeResult>> {
    let service = OrderService::new(state.db, &state.config);
    let result = service
        .change_status(order_id, input, &Actor::from(&user))
        .await?;
    Ok(Json(result))
}

/// Delete an order
pub async fn delete_order(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;

    let service = OrderService::new(state.db, &state.config);
    service.delete_order(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
