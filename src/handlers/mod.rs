pub mod checkout;
pub mod health;
pub mod orders;
pub mod payment_webhooks;

use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Builds the engine's HTTP surface. Authentication for the admin route is
/// enforced upstream; this layer only does routing and serialization.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/checkout", post(checkout::create_checkout))
        .route("/webhooks/payment", post(payment_webhooks::payment_webhook))
        .route(
            "/orders/:id",
            get(orders::get_order).put(orders::update_order_status),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}
