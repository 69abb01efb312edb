//! HTTP handlers for product catalogue endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::services::product::{
    CreateProductInput, ListProductsQuery, ProductResponse, ProductService, UpdateProductInput,
};
use crate::services::Actor;
use crate::AppState;

/// List products
pub async fn list_products(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListProductsQuery>,
) -> AppResult<Json<Vec<ProductResponse>>> {
    let service = ProductService::new(state.db);
    let products = service.list_products(query).await?;
    Ok(Json(products))
}

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(input): ApiJson<CreateProductInput>,
) -> AppResult<(StatusCode, Json<ProductResponse>)> {
    let service = ProductService::new(state.db);
    let product = service.create_product(input, &Actor::from(&user)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product
pub async fn get_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    let service = ProductService::new(state.db);
    let product = service.get_product(product_id).await?;
    Ok(Json(product))
}

/// Update a product
pub async fn update_product(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    ApiJson(input): ApiJson<UpdateProductInput>,
) -> AppResult<Json<ProductResponse>> {
    let service = ProductService::new(state.db);
    let product = service.update_product(product_id, input).await?;
    Ok(Json(product))
}

/// Delete a product that no order uses
pub async fn delete_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;

    let service = ProductService::new(state.db);
    service.delete_product(product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Archive a product
pub async fn archive_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    user.require_manager()?;

    let service = ProductService::new(state.db);
    let product = service.archive_product(product_id).await?;
    Ok(Json(product))
}

/// Restore an archived product
pub async fn restore_product(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductResponse>> {
    user.require_manager()?;

    let service = ProductService::new(state.db);
    let product = service.restore_product(product_id).await?;
    Ok(Json(product))
}
