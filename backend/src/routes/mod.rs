//! Route definitions for the ERP back-office

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .merge(protected_routes(state))
}

/// Everything behind a bearer token
fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(handlers::get_dashboard))
        .nest("/customers", customer_routes())
        .nest("/products", product_routes())
        .nest("/stock", stock_routes())
        .nest("/orders", order_routes())
        .nest("/planning", planning_routes())
        .nest("/notifications", notification_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Customer routes
fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_customers).post(handlers::create_customer))
        .route(
            "/:customer_id",
            get(handlers::get_customer)
                .put(handlers::update_customer)
                .delete(handlers::delete_customer),
        )
}

/// Product catalogue routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route(
            "/:product_id",
            get(handlers::get_product)
                .put(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route("/:product_id/archive", post(handlers::archive_product))
        .route("/:product_id/restore", post(handlers::restore_product))
        // Stock
        .route("/:product_id/adjust-stock", post(handlers::adjust_stock))
        .route("/:product_id/movements", get(handlers::get_product_movements))
}

/// Stock journal routes
fn stock_routes() -> Router<AppState> {
    Router::new().route("/movements", get(handlers::list_movements))
}

/// Order routes
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/stats", get(handlers::get_order_stats))
        .route(
            "/:order_id",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/:order_id/status", post(handlers::change_order_status))
}

/// Planning calendar routes
fn planning_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_planning_overview))
        .route("/events", get(handlers::list_events).post(handlers::add_event))
        .route("/events/:event_id", delete(handlers::delete_event))
}

/// Notification routes
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_notifications))
        .route("/unread-count", get(handlers::get_unread_count))
        .route("/mark-all-read", post(handlers::mark_all_as_read))
        .route("/generate", post(handlers::generate_notifications))
        .route("/:notification_id/read", post(handlers::mark_as_read))
}
