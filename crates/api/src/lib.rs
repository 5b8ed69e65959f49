//! HTTP API server with observability for the storefront system.
//!
//! Provides REST endpoints for catalog seeding, checkout and order status
//! updates, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::{
    CheckoutService, InMemoryCartService, InMemoryNotificationService, StatusService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub checkout: CheckoutService<S, InMemoryNotificationService, InMemoryCartService>,
    pub status: StatusService<S, InMemoryNotificationService>,
    pub notifier: InMemoryNotificationService,
    pub carts: InMemoryCartService,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/checkout", post(routes::checkout::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/status",
            post(routes::orders::update_status::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory collaborator
/// services wired to the given store.
pub fn create_default_state<S: Store + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    let notifier = InMemoryNotificationService::new();
    let carts = InMemoryCartService::new();

    let checkout = CheckoutService::new(store.clone(), notifier.clone(), carts.clone());
    let status = StatusService::new(store.clone(), notifier.clone());

    Arc::new(AppState {
        store,
        checkout,
        status,
        notifier,
        carts,
    })
}
