use anyhow::{Result, bail};
use std::sync::Arc;
use tracing::info;

use crate::{
    clients::{
        AllowAllQuotaAuthority, AllowListQuotaAuthority, DefaultQueryParser,
        DnsAuthority, InMemoryDnsAuthority, KeycloakIdentityRegistry,
        QuotaAuthority, StaticClusterPlacement,
    },
    config::{AppConfig, QuotaType},
    services::{Collaborators, KafkaService},
    storage::create_kafka_storage,
};

/// Build a fully-wired KafkaService from an already loaded configuration.
///
/// The only built-in DNS authority is process-local, so external
/// certificate mode is refused here. Use [`build_kafka_service_with_dns`]
/// to supply a real authority.
pub fn build_kafka_service(config: &AppConfig) -> Result<KafkaService> {
    if config.kafka_enable_external_certificate {
        bail!(
            "KAFKA_ENABLE_EXTERNAL_CERTIFICATE requires a DNS authority; \
             none is built in, embed the service with build_kafka_service_with_dns"
        );
    }
    build_kafka_service_with_dns(config, Arc::new(InMemoryDnsAuthority::new()))
}

/// Build a KafkaService that publishes its CNAME records through `dns`.
pub fn build_kafka_service_with_dns(
    config: &AppConfig,
    dns: Arc<dyn DnsAuthority>,
) -> Result<KafkaService> {
    let storage = create_kafka_storage(&config.storage())?;

    let quota_config = config.quota();
    let quota: Arc<dyn QuotaAuthority> = match quota_config.quota_type {
        QuotaType::AllowAll => Arc::new(AllowAllQuotaAuthority),
        QuotaType::AllowList => Arc::new(AllowListQuotaAuthority::new(
            quota_config.allowed_organisations,
            quota_config.allowed_owners,
        )),
    };

    let placement = config.placement();
    info!(clusters = placement.len(), "loaded static cluster placement");

    let collaborators = Collaborators {
        placement: Arc::new(StaticClusterPlacement::new(placement)),
        quota,
        identity: Arc::new(KeycloakIdentityRegistry::new(config.keycloak())?),
        dns,
        query_parser: Arc::new(DefaultQueryParser),
    };

    Ok(KafkaService::new(storage, collaborators, config.kafka()))
}

/// Build a fully-wired KafkaService from environment variables.
/// Mirrors the logic in bin/main and is useful for tests and embedding.
pub fn build_kafka_service_from_env() -> Result<KafkaService> {
    let config = AppConfig::load_from_env()?;
    build_kafka_service(&config)
}
