//! Route definitions for the koperasi back office

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/kitchen-orders", kitchen_order_routes())
        .nest("/stock", stock_routes())
        .nest("/finance", finance_routes())
        .nest("/dapurs", dapur_routes())
        .route("/qr/:qr_string", get(handlers::resolve_qr))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Purchase order lifecycle
fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route(
            "/:id",
            get(handlers::get_purchase_order).delete(handlers::delete_purchase_order),
        )
        .route("/:id/send", post(handlers::send_purchase_order))
        .route("/:id/confirm-supplier", post(handlers::confirm_supplier))
        .route("/:id/confirm-koperasi", post(handlers::confirm_koperasi))
        .route("/:id/receive", post(handlers::receive_goods))
        .route("/:id/cancel", post(handlers::cancel_purchase_order))
}

/// Kitchen order lifecycle
fn kitchen_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_kitchen_orders).post(handlers::create_kitchen_order),
        )
        .route(
            "/:id",
            get(handlers::get_kitchen_order).delete(handlers::delete_kitchen_order),
        )
        .route("/:id/send", post(handlers::send_kitchen_order))
        .route("/:id/process", post(handlers::process_kitchen_order))
        .route("/:id/deliver", post(handlers::deliver_kitchen_order))
        .route("/:id/cancel", post(handlers::cancel_kitchen_order))
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/items",
            get(handlers::list_stock_items).post(handlers::create_stock_item),
        )
        .route("/items/:id", get(handlers::get_stock_item))
        .route("/items/:id/batches", get(handlers::list_stock_batches))
        .route("/low", get(handlers::list_low_stock))
        .route("/expire-sweep", post(handlers::expire_sweep))
}

fn finance_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(handlers::list_transactions))
        .route("/transactions/:id", get(handlers::get_transaction))
        .route(
            "/transactions/:id/mark-paid",
            post(handlers::mark_transaction_paid),
        )
}

fn dapur_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::list_dapurs).post(handlers::create_dapur))
}
