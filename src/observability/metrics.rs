use prometheus::{Gauge, Histogram, HistogramOpts, IntCounterVec, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

pub const OUTCOME_SUCCESS: &str = "success";
pub const OUTCOME_FAILURE: &str = "failure";

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token issuance
    pub token_requests: IntCounterVec,
    pub token_failures: IntCounterVec,
    pub token_issue_duration: Histogram,
    pub token_expires_in: IntGauge,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,

    // === Service resource metrics ===
    pub process_cpu_usage: Gauge,
    pub process_memory_usage: IntGauge,
    pub process_virtual_memory: IntGauge,
    pub process_open_fds: IntGauge,
    pub process_start_time: IntGauge,
    pub process_uptime: IntGauge,
}

// Metric names and label sets are static; construction only fails on programmer error.
const INVALID_METRIC: &str = "invalid static metric definition";

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("gcpkafkaauth".into()), None).expect(INVALID_METRIC);

        let metrics: Arc<Metrics> = Arc::new(Self {
            token_requests: IntCounterVec::new(Opts::new("token_requests_total", "Token issuance requests by outcome"), &["outcome"]).expect(INVALID_METRIC),
            token_failures: IntCounterVec::new(Opts::new("token_failures_total", "Token issuance failures by reason"), &["reason"]).expect(INVALID_METRIC),
            token_issue_duration: Histogram::with_opts(HistogramOpts::new("token_issue_duration_seconds", "Credential lookup and token assembly time").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0])).expect(INVALID_METRIC),
            token_expires_in: IntGauge::new("token_expires_in_seconds", "expires_in of the last issued token").expect(INVALID_METRIC),

            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").expect(INVALID_METRIC),
            up: IntGauge::new("up", "1 if service is healthy").expect(INVALID_METRIC),
            process_cpu_usage: Gauge::new("process_cpu_usage_percent", "CPU usage % of this process").expect(INVALID_METRIC),
            process_memory_usage: IntGauge::new("process_memory_usage_bytes", "Resident memory used by this process").expect(INVALID_METRIC),
            process_virtual_memory: IntGauge::new("process_virtual_memory_bytes", "Virtual memory used by this process").expect(INVALID_METRIC),
            process_open_fds: IntGauge::new("process_open_fds", "Number of open file descriptors").expect(INVALID_METRIC),
            process_start_time: IntGauge::new("process_start_time_seconds", "Process start time (UNIX seconds)").expect(INVALID_METRIC),
            process_uptime: IntGauge::new("process_uptime_seconds", "Process uptime seconds").expect(INVALID_METRIC),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.token_requests.clone()),
            Box::new(metrics.token_failures.clone()),
            Box::new(metrics.token_issue_duration.clone()),
            Box::new(metrics.token_expires_in.clone()),
            Box::new(metrics.config_validation_errors.clone()),
            Box::new(metrics.up.clone()),
            Box::new(metrics.process_cpu_usage.clone()),
            Box::new(metrics.process_memory_usage.clone()),
            Box::new(metrics.process_virtual_memory.clone()),
            Box::new(metrics.process_open_fds.clone()),
            Box::new(metrics.process_start_time.clone()),
            Box::new(metrics.process_uptime.clone()),
        ];
        for collector in collectors {
            reg.register(collector).expect(INVALID_METRIC);
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn registry_exposes_namespaced_metrics() {
        let metrics = get_metrics().await;
        metrics.token_requests.with_label_values(&[OUTCOME_SUCCESS]).inc_by(0);

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("gcpkafkaauth_token_requests_total"), "{text}");
        assert!(text.contains("gcpkafkaauth_up"), "{text}");
    }
}
