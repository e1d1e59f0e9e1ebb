//! Route definitions for the stock approval API

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
        // Protected routes - workflows and stock queries
        .merge(protected_routes(state))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/intakes", intake_routes())
        .nest("/issuances", issuance_routes())
        .nest("/products", product_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Intake workflow routes
fn intake_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_intakes).post(handlers::create_intake),
        )
        .route(
            "/:id",
            get(handlers::get_intake)
                .put(handlers::edit_intake)
                .delete(handlers::delete_intake),
        )
        .route("/:id/hold", post(handlers::hold_intake))
        .route("/:id/keep-on-hold", post(handlers::keep_intake_on_hold))
        .route("/:id/approve", post(handlers::approve_intake))
        .route("/:id/reject", post(handlers::reject_intake))
        .route("/:id/history", get(handlers::intake_history))
}

/// Issuance workflow routes
fn issuance_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_issuances).post(handlers::create_issuance),
        )
        .route(
            "/:id",
            get(handlers::get_issuance)
                .put(handlers::edit_issuance)
                .delete(handlers::delete_issuance),
        )
        .route("/:id/hold", post(handlers::hold_issuance))
        .route("/:id/approve", post(handlers::approve_issuance))
        .route("/:id/reject", post(handlers::reject_issuance))
        .route("/:id/history", get(handlers::issuance_history))
}

/// Product stock routes
fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/:id/movements", get(handlers::product_movements))
        .route("/:id/stock-status", get(handlers::product_stock_status))
}
