use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Meter};
use std::sync::OnceLock;

/// Lifecycle operations tracked by the request counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KafkaOperation {
    Create,
    Deprovision,
    Delete,
}

impl KafkaOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            KafkaOperation::Create => "create",
            KafkaOperation::Deprovision => "deprovision",
            KafkaOperation::Delete => "delete",
        }
    }

    fn attrs(&self) -> [KeyValue; 1] {
        [KeyValue::new("operation", self.as_str())]
    }
}

#[derive(Clone)]
pub struct KafkaMetrics {
    pub operations_total: Counter<u64>,
    pub operations_success_total: Counter<u64>,
    pub status_since_created_seconds: Gauge<f64>,
}

static KAFKA_METRICS: OnceLock<KafkaMetrics> = OnceLock::new();

/// Initialize (or fetch existing) lifecycle metrics. The first call wins, so
/// an exporter must be installed before the service is built.
pub fn init_kafka_metrics() -> KafkaMetrics {
    KAFKA_METRICS
        .get_or_init(|| {
            let meter: Meter = opentelemetry::global::meter("kfm-manager");
            let operations_total = meter
                .u64_counter("kfm.kafka.operations.total")
                .with_description("Kafka lifecycle operations attempted")
                .build();
            let operations_success_total = meter
                .u64_counter("kfm.kafka.operations.success.total")
                .with_description("Kafka lifecycle operations that succeeded")
                .build();
            let status_since_created_seconds = meter
                .f64_gauge("kfm.kafka.status.since_created.seconds")
                .with_description(
                    "Seconds between request creation and entering a status",
                )
                .with_unit("s")
                .build();
            KafkaMetrics {
                operations_total,
                operations_success_total,
                status_since_created_seconds,
            }
        })
        .clone()
}

impl KafkaMetrics {
    #[inline]
    pub fn record_operations(&self, op: KafkaOperation, n: u64) {
        if n > 0 {
            self.operations_total.add(n, &op.attrs());
        }
    }

    #[inline]
    pub fn record_success(&self, op: KafkaOperation, n: u64) {
        if n > 0 {
            self.operations_success_total.add(n, &op.attrs());
        }
    }

    /// Attempt and success together, for operations that only record once done.
    #[inline]
    pub fn record_completed(&self, op: KafkaOperation, n: u64) {
        self.record_operations(op, n);
        self.record_success(op, n);
    }

    pub fn record_status_since_created(
        &self,
        status: &'static str,
        cluster_id: &str,
        seconds: f64,
    ) {
        self.status_since_created_seconds.record(
            seconds,
            &[
                KeyValue::new("status", status),
                KeyValue::new("cluster_id", cluster_id.to_string()),
            ],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_labels() {
        assert_eq!(KafkaOperation::Create.as_str(), "create");
        assert_eq!(KafkaOperation::Deprovision.as_str(), "deprovision");
        assert_eq!(KafkaOperation::Delete.as_str(), "delete");
    }

    #[test]
    fn init_idempotent() {
        let m1 = init_kafka_metrics();
        let m2 = init_kafka_metrics();
        m1.record_completed(KafkaOperation::Create, 1);
        m2.record_operations(KafkaOperation::Deprovision, 0);
        m2.record_status_since_created("accepted", "", 0.5);
    }
}
