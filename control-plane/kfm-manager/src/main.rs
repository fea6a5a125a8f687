use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use kfm_manager::{build_kafka_service, config::AppConfig, services::KafkaService};
use kfm_observability::{TracingConfig, setup_tracing};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("kfm-manager")
        .about("Kafka fleet manager lifecycle controller")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("run-once")
                .long("run-once")
                .help("Run a single expiry pass and exit")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let config = AppConfig::load_from_env()?;

    let observability = config.observability();
    setup_tracing(TracingConfig::new(
        "kfm-manager",
        &observability.log_level,
        observability.json_format,
    ))?;

    if let Err(e) = kfm_observability::init_otlp_metrics_if_configured("kfm-manager")
    {
        warn!(error = %e, "Failed to initialize OTLP metrics exporter");
    }

    info!(
        storage = ?config.storage().storage_type,
        quota = ?config.quota().quota_type,
        auth_on_kafka = config.keycloak_enable_auth_on_kafka,
        external_certificate = config.kafka_enable_external_certificate,
        "Starting kafka fleet manager"
    );

    let service = Arc::new(build_kafka_service(&config)?);
    service.health().await?;
    if !service.has_available_capacity().await? {
        warn!("kafka capacity is exhausted, new requests will be refused");
    }

    let lifespan = service.config().lifespan.clone();
    if !lifespan.enable_deletion_of_expired {
        info!("deletion of expired kafkas is disabled");
        return Ok(());
    }

    if matches.get_flag("run-once") {
        expire(&service, lifespan.lifespan_hours).await;
        return Ok(());
    }

    info!(
        lifespan_hours = lifespan.lifespan_hours,
        interval_secs = lifespan.check_interval.as_secs(),
        "Starting expired kafka worker"
    );
    let mut ticker = tokio::time::interval(lifespan.check_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => expire(&service, lifespan.lifespan_hours).await,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

async fn expire(service: &KafkaService, lifespan_hours: i64) {
    if let Err(e) = service.deprovision_expired(lifespan_hours).await {
        error!(error = %e, "expired kafka pass failed");
    }
}
