use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use common_http_errors::{telemetry, ApiError, ApiResult, ERROR_CODE_HEADER};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{CheckoutError, WebhookError};
use crate::gateway::GatewayError;
use crate::model::TransactionRequest;
use crate::store::RecordOutcome;
use crate::AppState;

pub async fn create_transaction(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let trace_id = Uuid::new_v4();
    let request: TransactionRequest = serde_json::from_slice(&body).map_err(|e| {
        warn!(%trace_id, error = %e, "Rejected transaction request with malformed JSON");
        state.metrics.record_transaction("invalid");
        ApiError::BadRequest {
            code: "malformed_json",
            trace_id: Some(trace_id),
            message: Some(e.to_string()),
        }
    })?;

    match state.initiator.create_transaction(request).await {
        Ok(done) => {
            if done.response.is_success() {
                state.metrics.record_transaction("submitted");
                let status = StatusCode::from_u16(done.response.status).unwrap_or(StatusCode::OK);
                Ok((status, Json(done.response.body)).into_response())
            } else {
                warn!(
                    %trace_id,
                    reference = %done.reference,
                    upstream_status = done.response.status,
                    "Gateway declined the transaction request"
                );
                state.metrics.record_transaction("upstream_rejected");
                Ok(upstream_failure(done.response.body))
            }
        }
        Err(CheckoutError::Gateway(GatewayError::Rejected { endpoint, status, body })) => {
            warn!(%trace_id, endpoint, upstream_status = status, "Gateway rejected the merchant lookup");
            state.metrics.record_transaction("upstream_rejected");
            Ok(upstream_failure(body))
        }
        Err(err) => {
            match &err {
                CheckoutError::Validation(e) => {
                    info!(%trace_id, code = e.code(), error = %e, "Transaction request failed validation");
                    state.metrics.record_transaction("invalid");
                }
                CheckoutError::Configuration(name) => {
                    error!(%trace_id, variable = *name, "Checkout is missing required configuration");
                    state.metrics.record_transaction("configuration_error");
                }
                CheckoutError::Gateway(e) => {
                    error!(%trace_id, code = e.code(), error = %e, "Gateway call failed");
                    state.metrics.record_transaction("gateway_error");
                }
            }
            Err(err.into_api_error(trace_id))
        }
    }
}

/// Upstream error bodies are passed through for diagnostics, always as 400.
fn upstream_failure(body: Value) -> Response {
    let mut resp = (StatusCode::BAD_REQUEST, Json(body)).into_response();
    resp.headers_mut()
        .insert(ERROR_CODE_HEADER, HeaderValue::from_static("gateway_rejected"));
    resp
}

pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    match state.webhooks.handle(&body, &headers).await {
        Ok(processed) => {
            let outcome = match processed.outcome {
                RecordOutcome::Applied => "applied",
                RecordOutcome::Duplicate => "duplicate",
            };
            state.metrics.record_webhook(outcome);
            Ok(Json(json!({ "received": true })))
        }
        Err(err) => {
            let trace_id = Uuid::new_v4();
            if let WebhookError::Storage(e) = &err {
                error!(%trace_id, error = %e, "Failed to record webhook status change");
            }
            state.metrics.record_webhook(err.code());
            Err(err.into_api_error(trace_id))
        }
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(telemetry::metric_families()),
    )
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed { trace_id: None }
}

pub async fn route_not_found() -> ApiError {
    ApiError::NotFound {
        code: "route_not_found",
        trace_id: None,
    }
}
