//! Prometheus metrics for the decision path.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Metric instruments, registered into a registry owned by the app.
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    requests_allowed: IntCounterVec,
    requests_denied: IntCounterVec,
    latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new(
                "rate_limiter_requests_total",
                "Total number of rate limit check requests",
            ),
            &["algorithm", "key_prefix"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let requests_allowed = IntCounterVec::new(
            Opts::new("rate_limiter_requests_allowed", "Number of requests allowed"),
            &["algorithm", "key_prefix"],
        )?;
        registry.register(Box::new(requests_allowed.clone()))?;

        let requests_denied = IntCounterVec::new(
            Opts::new("rate_limiter_requests_denied", "Number of requests denied"),
            &["algorithm", "key_prefix"],
        )?;
        registry.register(Box::new(requests_denied.clone()))?;

        let latency = HistogramVec::new(
            HistogramOpts::new(
                "rate_limiter_latency_seconds",
                "Decision latency in seconds",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["algorithm", "operation"],
        )?;
        registry.register(Box::new(latency.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            requests_allowed,
            requests_denied,
            latency,
        })
    }

    /// Record one check outcome under low-cardinality labels.
    pub fn record_request(&self, algorithm: &str, key_prefix: &str, allowed: bool, latency: f64) {
        self.requests_total
            .with_label_values(&[algorithm, key_prefix])
            .inc();

        if allowed {
            self.requests_allowed
                .with_label_values(&[algorithm, key_prefix])
                .inc();
        } else {
            self.requests_denied
                .with_label_values(&[algorithm, key_prefix])
                .inc();
        }

        self.latency
            .with_label_values(&[algorithm, "check"])
            .observe(latency);
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
