//! # Prometheus Metrics
//!
//! Operational metrics for the privacy node, scraped at `/metrics` on the
//! configured metrics port. All metrics live in a dedicated
//! [`prometheus::Registry`] so they never collide with a default global
//! registry consumer.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are internally shared) and passed
/// to axum handlers through application state.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Registry that owns all metrics below.
    registry: Registry,
    /// Total successful agent registrations.
    pub agents_registered_total: IntCounter,
    /// Total channels created.
    pub channels_created_total: IntCounter,
    /// Total invitations issued at channel creation.
    pub invitations_issued_total: IntCounter,
    /// Total encrypted messages accepted into storage.
    pub messages_stored_total: IntCounter,
    /// Total TTL-expired messages physically removed by the sweeper.
    pub messages_swept_total: IntCounter,
    /// Number of sweeper passes completed.
    pub sweeps_total: IntCounter,
    /// Requests currently being handled.
    pub requests_in_flight: IntGauge,
    /// Sweeper pass duration in seconds.
    pub sweep_duration_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("moltbook".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }

        let agents_registered_total = counter(
            &registry,
            "agents_registered_total",
            "Total successful agent registrations",
        );
        let channels_created_total = counter(
            &registry,
            "channels_created_total",
            "Total channels created",
        );
        let invitations_issued_total = counter(
            &registry,
            "invitations_issued_total",
            "Total invitations issued at channel creation",
        );
        let messages_stored_total = counter(
            &registry,
            "messages_stored_total",
            "Total encrypted messages accepted into storage",
        );
        let messages_swept_total = counter(
            &registry,
            "messages_swept_total",
            "Total TTL-expired messages removed by the sweeper",
        );
        let sweeps_total = counter(&registry, "sweeps_total", "Sweeper passes completed");

        let requests_in_flight =
            IntGauge::new("requests_in_flight", "Requests currently being handled")
                .expect("metric creation");
        registry
            .register(Box::new(requests_in_flight.clone()))
            .expect("metric registration");

        let sweep_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("sweep_duration_seconds", "Sweeper pass duration in seconds")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(sweep_duration_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            agents_registered_total,
            channels_created_total,
            invitations_issued_total,
            messages_stored_total,
            messages_swept_total,
            sweeps_total,
            requests_in_flight,
            sweep_duration_seconds,
        }
    }

    /// Encode all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler rendering `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
