//! HTTP handlers for customer endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::services::customer::{Customer, CustomerInput, CustomerService, ListCustomersQuery};
use crate::AppState;

/// List customers
pub async fn list_customers(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListCustomersQuery>,
) -> AppResult<Json<Vec<Customer>>> {
    let service = CustomerService::new(state.db);
    let customers = service.list_customers(query).await?;
    Ok(Json(customers))
}

/// Create a customer
pub async fn create_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    ApiJson(input): ApiJson<CustomerInput>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    let service = CustomerService::new(state.db);
    let customer = service.create_customer(input).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Get a customer
pub async fn get_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<Json<Customer>> {
    let service = CustomerService::new(state.db);
    let customer = service.get_customer(customer_id).await?;
    Ok(Json(customer))
}

/// Update a customer
pub async fn update_customer(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(customer_id): Path<Uuid>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> AppResult<Json<Customer>> {
    let service = CustomerService::new(state.db);
    let customer = service.update_customer(customer_id, input).await?;
    Ok(Json(customer))
}

/// Delete a customer without orders
pub async fn delete_customer(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(customer_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    user.require_manager()?;

    let service = CustomerService::new(state.db);
    service.delete_customer(customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
