use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use common_http_errors::http_error_metrics_layer;
use common_observability::CheckoutMetrics;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod initiator;
pub mod model;
pub mod store;
pub mod webhook;

use config::CheckoutConfig;
use gateway::PaymentGateway;
use initiator::TransactionInitiator;
use store::StatusEventSink;
use webhook::WebhookProcessor;

pub const SERVICE_NAME: &str = "checkout-service";

#[derive(Clone)]
pub struct AppState {
    pub initiator: Arc<TransactionInitiator>,
    pub webhooks: Arc<WebhookProcessor>,
    pub metrics: Arc<CheckoutMetrics>,
}

impl AppState {
    pub fn new(
        config: Arc<CheckoutConfig>,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn StatusEventSink>,
        metrics: Arc<CheckoutMetrics>,
    ) -> Self {
        let webhooks = WebhookProcessor::from_config(&config, sink);
        let initiator = TransactionInitiator::new(config, gateway);
        Self {
            initiator: Arc::new(initiator),
            webhooks: Arc::new(webhooks),
            metrics,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/api/createTransaction",
            post(handlers::create_transaction).fallback(handlers::method_not_allowed),
        )
        .route(
            "/api/webhook",
            post(handlers::receive_webhook).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::route_not_found)
        .layer(middleware::from_fn(http_error_metrics_layer(SERVICE_NAME)))
        .with_state(state)
}
