use async_trait::async_trait;
use common_observability::CheckoutMetrics;
use reqwest::{header, Client};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error};

use crate::model::GatewayTransactionPayload;

const ACCEPTANCE_TOKEN_POINTER: &str = "/data/presigned_acceptance/acceptance_token";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway request to {endpoint} failed: {message}")]
    Transport { endpoint: &'static str, message: String },
    #[error("gateway returned a malformed {endpoint} response: {message}")]
    MalformedResponse { endpoint: &'static str, message: String },
    #[error("gateway rejected the {endpoint} request with status {status}")]
    Rejected {
        endpoint: &'static str,
        status: u16,
        body: Value,
    },
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Transport { .. } => "gateway_unavailable",
            GatewayError::MalformedResponse { .. } => "gateway_malformed_response",
            GatewayError::Rejected { .. } => "gateway_rejected",
        }
    }
}

/// Gateway reply to a transaction submission, passed back to the caller untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Value,
}

impl GatewayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Read the merchant's presigned acceptance token.
    async fn acceptance_token(&self, public_key: &str) -> Result<String, GatewayError>;

    /// Submit a transaction. Non-2xx replies are returned as a response, not an error.
    async fn create_transaction(
        &self,
        private_key: &str,
        payload: &GatewayTransactionPayload,
    ) -> Result<GatewayResponse, GatewayError>;
}

/// `reqwest`-backed client for the gateway's REST API.
pub struct HttpGateway {
    client: Client,
    base_url: String,
    metrics: Option<Arc<CheckoutMetrics>>,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<CheckoutMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn observe(&self, endpoint: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_gateway_call(endpoint, started.elapsed().as_secs_f64());
        }
    }
}

async fn read_json(endpoint: &'static str, resp: reqwest::Response) -> Result<(u16, Value), GatewayError> {
    let status = resp.status().as_u16();
    let bytes = resp.bytes().await.map_err(|e| GatewayError::Transport {
        endpoint,
        message: e.to_string(),
    })?;
    let body = serde_json::from_slice::<Value>(&bytes).map_err(|e| GatewayError::MalformedResponse {
        endpoint,
        message: format!("status {status}, body is not JSON: {e}"),
    })?;
    Ok((status, body))
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn acceptance_token(&self, public_key: &str) -> Result<String, GatewayError> {
        const ENDPOINT: &str = "merchants";
        let url = format!("{}/merchants/{}", self.base_url, public_key);
        let started = Instant::now();
        let result = self.client.get(&url).send().await;
        self.observe(ENDPOINT, started);
        let resp = result.map_err(|e| {
            error!(error = %e, endpoint = ENDPOINT, "Merchant lookup request failed");
            GatewayError::Transport { endpoint: ENDPOINT, message: e.to_string() }
        })?;
        let (status, body) = read_json(ENDPOINT, resp).await?;
        if !(200..300).contains(&status) {
            return Err(GatewayError::Rejected { endpoint: ENDPOINT, status, body });
        }
        let token = body
            .pointer(ACCEPTANCE_TOKEN_POINTER)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GatewayError::MalformedResponse {
                endpoint: ENDPOINT,
                message: "data.presigned_acceptance.acceptance_token is missing".to_string(),
            })?;
        debug!("Fetched merchant acceptance token");
        Ok(token.to_string())
    }

    async fn create_transaction(
        &self,
        private_key: &str,
        payload: &GatewayTransactionPayload,
    ) -> Result<GatewayResponse, GatewayError> {
        const ENDPOINT: &str = "transactions";
        let url = format!("{}/transactions", self.base_url);
        let started = Instant::now();
        let result = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", private_key))
            .json(payload)
            .send()
            .await;
        self.observe(ENDPOINT, started);
        let resp = result.map_err(|e| {
            error!(error = %e, endpoint = ENDPOINT, reference = %payload.reference, "Transaction request failed");
            GatewayError::Transport { endpoint: ENDPOINT, message: e.to_string() }
        })?;
        let (status, body) = read_json(ENDPOINT, resp).await?;
        Ok(GatewayResponse { status, body })
    }
}
