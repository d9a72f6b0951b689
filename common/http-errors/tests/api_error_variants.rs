use common_http_errors::ApiError;
use axum::response::IntoResponse;
use axum::http::StatusCode;
use axum::body::to_bytes;
use uuid::Uuid;

#[test]
fn bad_request_variant() {
    let err = ApiError::BadRequest { code: "missing_required_fields", trace_id: None, message: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "missing_required_fields");
}

#[test]
fn not_found_variant() {
    let err = ApiError::NotFound { code: "route_not_found", trace_id: None };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "route_not_found");
}

#[test]
fn method_not_allowed_variant() {
    let resp = ApiError::MethodNotAllowed { trace_id: None }.into_response();
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "method_not_allowed");
}

#[test]
fn internal_variant() {
    let trace = Some(Uuid::new_v4());
    let err = ApiError::Internal { code: "configuration_error", trace_id: trace, message: Some("boom".into()) };
    let resp = err.into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "configuration_error");
}

#[tokio::test]
async fn envelope_carries_code_trace_and_message() {
    let trace = Uuid::new_v4();
    let resp = ApiError::BadRequest { code: "invalid_email", trace_id: Some(trace), message: Some("customerEmail is not a valid address".into()) }.into_response();
    let bytes = to_bytes(resp.into_body(), 1024 * 8).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["code"], "invalid_email");
    assert_eq!(v["trace_id"], trace.to_string());
    assert_eq!(v["message"], "customerEmail is not a valid address");
}

#[tokio::test]
async fn internal_helper_uses_generic_code() {
    let resp = ApiError::internal("synthetic", None).into_response();
    assert_eq!(resp.headers().get("X-Error-Code").unwrap(), "internal_error");
    let bytes = to_bytes(resp.into_body(), 1024 * 8).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(!text.contains("trace_id"), "absent trace id must be skipped: {text}");
}
