#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use checkout_service::{
    build_router,
    config::CheckoutConfig,
    gateway::{GatewayError, GatewayResponse, PaymentGateway},
    model::GatewayTransactionPayload,
    store::InMemoryStatusStore,
    AppState,
};
use common_observability::CheckoutMetrics;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Gateway double that records every call and answers with a canned reply.
pub struct RecordingGateway {
    pub token_calls: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<GatewayTransactionPayload>>,
    reply: GatewayResponse,
}

impl RecordingGateway {
    pub fn replying(status: u16, body: Value) -> Arc<Self> {
        Arc::new(Self {
            token_calls: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            reply: GatewayResponse { status, body },
        })
    }

    pub fn ok() -> Arc<Self> {
        Self::replying(201, json!({ "data": { "id": "tx1", "status": "PENDING" } }))
    }

    pub fn total_calls(&self) -> usize {
        self.token_calls.lock().unwrap().len() + self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn acceptance_token(&self, public_key: &str) -> Result<String, GatewayError> {
        self.token_calls.lock().unwrap().push(public_key.to_string());
        Ok("tok_accept".into())
    }

    async fn create_transaction(
        &self,
        _private_key: &str,
        payload: &GatewayTransactionPayload,
    ) -> Result<GatewayResponse, GatewayError> {
        self.submitted.lock().unwrap().push(payload.clone());
        Ok(self.reply.clone())
    }
}

pub fn config(pairs: &[(&str, &str)]) -> Arc<CheckoutConfig> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Arc::new(CheckoutConfig::from_lookup(|key| vars.get(key).cloned()))
}

pub fn keyed_config() -> Arc<CheckoutConfig> {
    config(&[
        ("WOMPI_PRIVATE_KEY", "prv_test_1"),
        ("WOMPI_PUBLIC_KEY", "pub_test_1"),
        ("WOMPI_WEBHOOK_SECRET", "test_events_secret"),
    ])
}

pub fn app_with(
    config: Arc<CheckoutConfig>,
    gateway: Arc<dyn PaymentGateway>,
) -> (Router, Arc<InMemoryStatusStore>) {
    let store = Arc::new(InMemoryStatusStore::new());
    let state = AppState::new(config, gateway, store.clone(), Arc::new(CheckoutMetrics::new()));
    (build_router(state), store)
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = to_bytes(resp.into_body(), 1024 * 64).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, headers, body)
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}
