//! Error-code counters fed from the `X-Error-Code` response header.
//!
//! Error codes are `&'static str` in this workspace, but the header can be set
//! by any handler, so label values are capped at [`MAX_ERROR_CODES`] distinct
//! codes; anything past the cap is counted under `overflow`.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use axum::{extract::Request, middleware::Next, response::Response};
use once_cell::sync::Lazy;
use prometheus::{proto::MetricFamily, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

use crate::ERROR_CODE_HEADER;

pub const MAX_ERROR_CODES: usize = 40;
const OVERFLOW_LABEL: &str = "overflow";

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

static HTTP_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let v = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    ).unwrap();
    REGISTRY.register(Box::new(v.clone())).ok();
    v
});

static DISTINCT_CODES: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("http_error_codes_distinct", "Distinct error codes observed").unwrap();
    REGISTRY.register(Box::new(g.clone())).ok();
    g
});

static OVERFLOW_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("http_error_codes_overflow_total", "Errors recorded under the overflow label").unwrap();
    REGISTRY.register(Box::new(c.clone())).ok();
    c
});

static SEEN_CODES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Count one error response. Returns the label actually used for `code`.
pub fn record_error_code(service: &str, code: &str, status: u16) -> String {
    let label = {
        let mut seen = SEEN_CODES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if seen.contains(code) {
            code.to_string()
        } else if seen.len() < MAX_ERROR_CODES {
            seen.insert(code.to_string());
            DISTINCT_CODES.set(seen.len() as i64);
            code.to_string()
        } else {
            OVERFLOW_TOTAL.inc();
            OVERFLOW_LABEL.to_string()
        }
    };
    HTTP_ERRORS_TOTAL
        .with_label_values(&[service, &label, &status.to_string()])
        .inc();
    label
}

pub fn distinct_codes() -> i64 {
    DISTINCT_CODES.get()
}

pub fn overflow_count() -> u64 {
    OVERFLOW_TOTAL.get()
}

/// Snapshot of the error metrics for merging into a service's `/metrics` output.
pub fn metric_families() -> Vec<MetricFamily> {
    Lazy::force(&HTTP_ERRORS_TOTAL);
    Lazy::force(&DISTINCT_CODES);
    Lazy::force(&OVERFLOW_TOTAL);
    REGISTRY.gather()
}

type LayerFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware for `axum::middleware::from_fn` counting every response with
/// status >= 400 by its `X-Error-Code` header.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request, Next) -> LayerFuture + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.as_u16() >= 400 {
                let code = resp
                    .headers()
                    .get(ERROR_CODE_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                record_error_code(service, code, status.as_u16());
            }
            resp
        })
    }
}
