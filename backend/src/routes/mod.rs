//! Route definitions for Agroledger

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Marketplace (public - buyers browse without an account)
        .nest("/marketplace", marketplace_routes())
        // Protected routes - inventory and notarization
        .nest("/inventory", inventory_routes(state.clone()))
        // Protected routes - ledger explorer
        .nest("/ledger", ledger_routes(state.clone()))
        // Protected routes - sales
        .nest("/sales", sale_routes(state))
}

/// Marketplace routes (public)
fn marketplace_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_marketplace))
        .route("/:item_id", get(handlers::get_marketplace_item))
}

/// Inventory routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/stats", get(handlers::get_inventory_stats))
        .route(
            "/:item_id",
            get(handlers::get_item)
                .put(handlers::update_item)
                .delete(handlers::delete_item),
        )
        .route("/:item_id/publish", post(handlers::publish_item))
        .route("/:item_id/unpublish", post(handlers::unpublish_item))
        .route("/:item_id/ledger", get(handlers::get_item_ledger_record))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Ledger explorer routes (protected)
fn ledger_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/records", get(handlers::list_ledger_records))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sale routes (protected)
fn sale_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::create_sale))
        .route("/total", get(handlers::get_sales_total))
        .route(
            "/:sale_id",
            get(handlers::get_sale)
                .put(handlers::update_sale)
                .delete(handlers::delete_sale),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
