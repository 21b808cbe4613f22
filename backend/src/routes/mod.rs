//! Route definitions for the Production Lot Engine
//!
//! Each resource is mounted under its hyphenated path and, for older
//! clients, under the underscore spelling as well.

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/production-lots", production_lot_routes(&state))
        .nest("/production_lots", production_lot_routes(&state))
        .nest("/inventory-alert-rules", alert_rule_routes(&state))
        .nest("/inventory_alert_rules", alert_rule_routes(&state))
        .nest("/inventory-alerts", inventory_alert_routes(&state))
        .nest("/inventory_alerts", inventory_alert_routes(&state))
        .nest("/procurement-recommendations", procurement_routes(&state))
        .nest("/procurement_recommendations", procurement_routes(&state))
        .nest("/catalog", catalog_routes(&state))
}

/// Production lot routes (protected)
fn production_lot_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create_production_lot).get(handlers::list_production_lots),
        )
        .route(
            "/:id",
            get(handlers::get_production_lot).delete(handlers::delete_production_lot),
        )
        .route("/:id/readiness", get(handlers::get_lot_readiness))
        .route("/:id/recalculate", post(handlers::recalculate_lot_totals))
        .route("/:id/evaluate-alerts", post(handlers::evaluate_lot_alerts))
        .route("/:id/finalize", post(handlers::finalize_production_lot))
        .route("/:id/execute", post(handlers::execute_production_lot))
        .route("/:id/complete", post(handlers::complete_production_lot))
        .route("/:id/fail", post(handlers::fail_production_lot))
        .route("/:id/cancel", post(handlers::cancel_production_lot))
        .route(
            "/:id/subprocesses",
            post(handlers::attach_lot_subprocess).get(handlers::list_lot_subprocesses),
        )
        .route(
            "/:id/subprocesses/:sub_id/variants",
            post(handlers::set_lot_variant_selections).put(handlers::set_lot_variant_selections),
        )
        .route(
            "/:id/subprocesses/:sub_id/status",
            patch(handlers::update_lot_subprocess_status),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Inventory alert rule routes (protected)
fn alert_rule_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create_alert_rule).get(handlers::list_alert_rules),
        )
        .route("/:id/deactivate", patch(handlers::deactivate_alert_rule))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Inventory alert routes (protected)
fn inventory_alert_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create_inventory_alert).get(handlers::list_inventory_alerts),
        )
        .route(
            "/bulk-acknowledge",
            post(handlers::bulk_acknowledge_inventory_alerts),
        )
        .route(
            "/bulk_acknowledge",
            post(handlers::bulk_acknowledge_inventory_alerts),
        )
        .route("/:id", get(handlers::get_inventory_alert))
        .route("/:id/acknowledge", post(handlers::acknowledge_inventory_alert))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Procurement recommendation routes (protected)
fn procurement_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create_recommendation).get(handlers::list_recommendations),
        )
        .route("/from-alert/:alert_id", post(handlers::recommend_from_alert))
        .route("/:id", get(handlers::get_recommendation))
        .route("/:id/status", patch(handlers::update_recommendation_status))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}

/// Catalog administration routes (protected)
fn catalog_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/cache/invalidate", post(handlers::invalidate_catalog_cache))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
}
