use prometheus::{proto::MetricFamily, Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct CheckoutMetrics {
    pub registry: Registry,
    pub transactions_total: IntCounterVec,
    pub webhook_events_total: IntCounterVec,
    pub gateway_request_duration_seconds: HistogramVec,
}

impl CheckoutMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let transactions_total = IntCounterVec::new(
            Opts::new(
                "checkout_transactions_total",
                "Transaction creation attempts grouped by outcome",
            ),
            &["outcome"],
        ).unwrap();
        let webhook_events_total = IntCounterVec::new(
            Opts::new(
                "checkout_webhook_events_total",
                "Gateway webhook deliveries grouped by outcome",
            ),
            &["outcome"],
        ).unwrap();
        let gateway_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "checkout_gateway_request_duration_seconds",
                "Latency of outbound calls to the payment gateway"
            ).buckets(vec![0.05,0.1,0.25,0.5,1.0,2.0,5.0,10.0]),
            &["endpoint"],
        ).unwrap();
        let _ = registry.register(Box::new(transactions_total.clone()));
        let _ = registry.register(Box::new(webhook_events_total.clone()));
        let _ = registry.register(Box::new(gateway_request_duration_seconds.clone()));
        CheckoutMetrics { registry, transactions_total, webhook_events_total, gateway_request_duration_seconds }
    }

    pub fn record_transaction(&self, outcome: &str) {
        self.transactions_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_webhook(&self, outcome: &str) {
        self.webhook_events_total.with_label_values(&[outcome]).inc();
    }

    pub fn observe_gateway_call(&self, endpoint: &str, seconds: f64) {
        self.gateway_request_duration_seconds.with_label_values(&[endpoint]).observe(seconds);
    }

    /// Prometheus text exposition of this registry plus any extra families
    /// (e.g. the shared HTTP error counters).
    pub fn render(&self, extra: Vec<MetricFamily>) -> String {
        let mut families = self.registry.gather();
        families.extend(extra);
        let mut buf = Vec::new();
        if TextEncoder::new().encode(&families, &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for CheckoutMetrics {
    fn default() -> Self { Self::new() }
}
