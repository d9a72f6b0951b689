use axum::http::HeaderMap;
use chrono::Utc;
use common_crypto::{SignatureError, SigningSecret};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{CheckoutConfig, UnsignedWebhookPolicy};
use crate::error::WebhookError;
use crate::model::{StatusChangeEvent, TransactionStatus};
use crate::store::{RecordOutcome, StatusEventSink};

pub const SIGNATURE_HEADER: &str = "X-Signature-Integrity";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    Verified,
    /// Processed without a signature check (no header, or no secret configured).
    Unverified,
}

impl Verification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verification::Verified => "verified",
            Verification::Unverified => "unverified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedWebhook {
    pub event: StatusChangeEvent,
    pub event_name: Option<String>,
    pub verification: Verification,
    pub outcome: RecordOutcome,
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event: Option<String>,
    data: Option<WebhookData>,
    transaction: Option<WebhookTransaction>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    transaction: Option<WebhookTransaction>,
}

#[derive(Debug, Deserialize)]
struct WebhookTransaction {
    id: Option<String>,
    reference: Option<String>,
    status: Option<String>,
}

/// Verifies, parses and dispatches gateway status notifications.
pub struct WebhookProcessor {
    secret: Option<SigningSecret>,
    unsigned: UnsignedWebhookPolicy,
    sink: Arc<dyn StatusEventSink>,
}

impl WebhookProcessor {
    pub fn new(
        secret: Option<SigningSecret>,
        unsigned: UnsignedWebhookPolicy,
        sink: Arc<dyn StatusEventSink>,
    ) -> Self {
        Self { secret, unsigned, sink }
    }

    pub fn from_config(config: &CheckoutConfig, sink: Arc<dyn StatusEventSink>) -> Self {
        Self::new(config.webhook_secret.clone(), config.unsigned_webhooks, sink)
    }

    /// Run one delivery through verification, parsing and the status sink.
    /// `raw_body` must be the bytes exactly as received.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        headers: &HeaderMap,
    ) -> Result<ProcessedWebhook, WebhookError> {
        let verification = self.verify(raw_body, headers)?;
        let (event, event_name) = parse_event(raw_body)?;

        let outcome = self.sink.record(&event).await?;
        match outcome {
            RecordOutcome::Applied => info!(
                transaction_id = %event.transaction_id,
                reference = %event.reference,
                status = %event.status,
                event = event_name.as_deref().unwrap_or("-"),
                verification = verification.as_str(),
                "Payment status change recorded"
            ),
            RecordOutcome::Duplicate => info!(
                transaction_id = %event.transaction_id,
                status = %event.status,
                "Duplicate webhook delivery ignored"
            ),
        }
        Ok(ProcessedWebhook {
            event,
            event_name,
            verification,
            outcome,
        })
    }

    fn verify(&self, raw_body: &[u8], headers: &HeaderMap) -> Result<Verification, WebhookError> {
        // a present header is always checked, even when empty or not ASCII
        let provided = headers.get(SIGNATURE_HEADER).map(|v| v.to_str().map(str::trim));

        let Some(secret) = &self.secret else {
            return match self.unsigned {
                UnsignedWebhookPolicy::Reject => {
                    warn!(target: "security", "Webhook refused: signatures required but no secret configured");
                    Err(WebhookError::MissingSecret)
                }
                UnsignedWebhookPolicy::Accept => {
                    warn!("WOMPI_WEBHOOK_SECRET not set; processing webhook without signature verification");
                    Ok(Verification::Unverified)
                }
            };
        };

        match provided {
            Some(Err(_)) => {
                warn!(target: "security", reason = "header is not visible ASCII", body_len = raw_body.len(), "Webhook signature rejected");
                Err(WebhookError::SignatureMismatch)
            }
            Some(Ok("")) => {
                warn!(target: "security", reason = "header is empty", body_len = raw_body.len(), "Webhook signature rejected");
                Err(WebhookError::SignatureMismatch)
            }
            Some(Ok(signature)) => match secret.verify_hex(raw_body, signature) {
                Ok(()) => Ok(Verification::Verified),
                Err(err) => {
                    let reason = match err {
                        SignatureError::Malformed => "signature is not hex",
                        SignatureError::Mismatch | SignatureError::InvalidMacKey => "digest mismatch",
                    };
                    warn!(target: "security", reason, body_len = raw_body.len(), "Webhook signature rejected");
                    Err(WebhookError::SignatureMismatch)
                }
            },
            None => match self.unsigned {
                UnsignedWebhookPolicy::Accept => {
                    warn!("Webhook arrived without {SIGNATURE_HEADER}; processing as unverified");
                    Ok(Verification::Unverified)
                }
                UnsignedWebhookPolicy::Reject => {
                    warn!(target: "security", "Webhook rejected: {SIGNATURE_HEADER} header missing");
                    Err(WebhookError::SignatureMissing)
                }
            },
        }
    }
}

fn parse_event(raw_body: &[u8]) -> Result<(StatusChangeEvent, Option<String>), WebhookError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(raw_body)
        .map_err(|e| malformed(format!("body is not a webhook envelope: {e}")))?;
    let transaction = envelope
        .data
        .and_then(|data| data.transaction)
        .or(envelope.transaction)
        .ok_or_else(|| malformed("missing transaction object".to_string()))?;

    let id = required(transaction.id, "transaction.id")?;
    let reference = required(transaction.reference, "transaction.reference")?;
    let status = required(transaction.status, "transaction.status")?;

    let event = StatusChangeEvent {
        transaction_id: id,
        reference,
        status: TransactionStatus::parse(&status),
        received_at: Utc::now(),
    };
    Ok((event, envelope.event))
}

fn required(value: Option<String>, field: &str) -> Result<String, WebhookError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(format!("missing {field}")))
}

fn malformed(reason: String) -> WebhookError {
    warn!(reason = %reason, "Malformed webhook payload");
    WebhookError::MalformedPayload(reason)
}
