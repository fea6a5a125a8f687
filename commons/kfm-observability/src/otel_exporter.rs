use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    metrics::{PeriodicReader, SdkMeterProvider},
};
use std::time::Duration;

type ExporterResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Initialize a basic OTLP metrics exporter (gRPC) with periodic reader.
pub fn init_otlp_metrics(
    service_name: &str,
    endpoint: Option<&str>,
    period: Duration,
) -> ExporterResult<()> {
    let endpoint = endpoint.unwrap_or("http://localhost:4317");

    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name.to_string()))
        .build();

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = PeriodicReader::builder(exporter).with_interval(period).build();

    let provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    opentelemetry::global::set_meter_provider(provider);
    Ok(())
}

/// Initialize the OTLP metrics exporter only when an endpoint is configured.
/// Returns Ok(true) if the exporter was installed, Ok(false) if skipped.
/// Env vars:
///  - OTEL_EXPORTER_OTLP_METRICS_ENDPOINT or OTEL_EXPORTER_OTLP_ENDPOINT (required to enable)
///  - OTEL_SERVICE_NAME (optional override)
///  - OTEL_METRICS_PERIOD_SECS (optional, default 30)
pub fn init_otlp_metrics_if_configured(
    default_service: &str,
) -> ExporterResult<bool> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_METRICS_ENDPOINT")
        .or_else(|_| std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT"))
        .ok()
        .filter(|v| !v.trim().is_empty());
    let Some(endpoint) = endpoint else {
        return Ok(false);
    };
    let service_name = std::env::var("OTEL_SERVICE_NAME")
        .unwrap_or_else(|_| default_service.to_string());
    let period = std::env::var("OTEL_METRICS_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);

    init_otlp_metrics(
        &service_name,
        Some(&endpoint),
        Duration::from_secs(period),
    )?;
    Ok(true)
}
