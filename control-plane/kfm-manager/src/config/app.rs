use anyhow::Result;
use envconfig::Envconfig;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Envconfig)]
pub struct AppConfig {
    // Kafka admission and placement
    #[envconfig(from = "KAFKA_MAX_CAPACITY", default = "1000")]
    pub kafka_max_capacity: u64,

    #[envconfig(from = "KAFKA_ENABLE_QUOTA_SERVICE", default = "false")]
    pub kafka_enable_quota_service: bool,

    #[envconfig(from = "KAFKA_DEFAULT_VERSION", default = "2.7.0")]
    pub kafka_default_version: String,

    #[envconfig(from = "KAFKA_ENABLE_EXTERNAL_CERTIFICATE", default = "false")]
    pub kafka_enable_external_certificate: bool,

    #[envconfig(from = "KAFKA_DOMAIN_NAME", default = "kafka.example.com")]
    pub kafka_domain_name: String,

    #[envconfig(from = "KAFKA_NUM_OF_BROKERS", default = "3")]
    pub kafka_num_of_brokers: usize,

    #[envconfig(from = "KAFKA_TLS_CERT")]
    pub kafka_tls_cert: Option<String>,

    #[envconfig(from = "KAFKA_TLS_KEY")]
    pub kafka_tls_key: Option<String>,

    // Per-instance capacity handed to the cluster reconciler
    #[envconfig(from = "KAFKA_INGRESS_EGRESS_THROUGHPUT_PER_SEC", default = "30Mi")]
    pub kafka_ingress_egress_throughput_per_sec: String,

    #[envconfig(from = "KAFKA_TOTAL_MAX_CONNECTIONS", default = "1000")]
    pub kafka_total_max_connections: i32,

    #[envconfig(from = "KAFKA_MAX_DATA_RETENTION_SIZE", default = "100Gi")]
    pub kafka_max_data_retention_size: String,

    #[envconfig(from = "KAFKA_MAX_PARTITIONS", default = "1000")]
    pub kafka_max_partitions: i32,

    #[envconfig(from = "KAFKA_MAX_DATA_RETENTION_PERIOD", default = "P14D")]
    pub kafka_max_data_retention_period: String,

    #[envconfig(from = "KAFKA_MAX_CONNECTION_ATTEMPTS_PER_SEC", default = "100")]
    pub kafka_max_connection_attempts_per_sec: i32,

    // Lifespan of trial instances
    #[envconfig(from = "KAFKA_ENABLE_DELETION_OF_EXPIRED", default = "true")]
    pub kafka_enable_deletion_of_expired: bool,

    #[envconfig(from = "KAFKA_LIFESPAN_HOURS", default = "48")]
    pub kafka_lifespan_hours: i64,

    /// Comma separated ids exempt from expiry.
    #[envconfig(from = "KAFKA_LONG_LIVED_KAFKAS", default = "")]
    pub kafka_long_lived_kafkas: String,

    #[envconfig(from = "EXPIRY_CHECK_INTERVAL_SECS", default = "300")]
    pub expiry_check_interval_secs: u64,

    // Identity provider
    #[envconfig(from = "KEYCLOAK_ENABLE_AUTH_ON_KAFKA", default = "false")]
    pub keycloak_enable_auth_on_kafka: bool,

    #[envconfig(from = "KEYCLOAK_BASE_URL", default = "http://localhost:8180")]
    pub keycloak_base_url: String,

    #[envconfig(from = "KEYCLOAK_REALM", default = "rhoas")]
    pub keycloak_realm: String,

    #[envconfig(from = "KEYCLOAK_CLIENT_ID", default = "kas-fleet-manager")]
    pub keycloak_client_id: String,

    #[envconfig(from = "KEYCLOAK_CLIENT_SECRET", default = "")]
    pub keycloak_client_secret: String,

    #[envconfig(from = "KEYCLOAK_USER_NAME_CLAIM", default = "clientId")]
    pub keycloak_user_name_claim: String,

    /// PEM bundle the brokers use to trust the identity provider.
    #[envconfig(from = "KEYCLOAK_TLS_TRUSTED_CERT")]
    pub keycloak_tls_trusted_cert: Option<String>,

    // Quota
    #[envconfig(from = "QUOTA_TYPE", default = "allow-all")]
    pub quota_type: String,

    #[envconfig(from = "QUOTA_ALLOWED_ORGANISATIONS", default = "")]
    pub quota_allowed_organisations: String,

    #[envconfig(from = "QUOTA_ALLOWED_OWNERS", default = "")]
    pub quota_allowed_owners: String,

    // Placement: `cluster-id=ingress.suffix,...`
    #[envconfig(from = "CLUSTER_DNS", default = "")]
    pub cluster_dns: String,

    // Storage configuration
    #[envconfig(from = "STORAGE_TYPE", default = "memory")]
    pub storage_type: String,

    #[envconfig(from = "SQLITE_PATH", default = "kfm.db")]
    pub sqlite_path: String,

    // Observability configuration
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,

    #[envconfig(from = "LOG_FORMAT", default = "json")]
    pub log_format: String,
}

impl AppConfig {
    /// Load configuration from environment variables only
    pub fn load_from_env() -> Result<Self> {
        Ok(Self::init_from_env()?)
    }

    pub fn kafka(&self) -> KafkaConfig {
        KafkaConfig {
            max_capacity: self.kafka_max_capacity,
            enable_quota_service: self.kafka_enable_quota_service,
            default_version: self.kafka_default_version.clone(),
            enable_external_certificate: self
                .kafka_enable_external_certificate,
            domain_name: self.kafka_domain_name.clone(),
            num_of_brokers: self.kafka_num_of_brokers,
            tls_cert: self.kafka_tls_cert.clone().unwrap_or_default(),
            tls_key: self.kafka_tls_key.clone().unwrap_or_default(),
            capacity: KafkaCapacityConfig {
                ingress_egress_throughput_per_sec: self
                    .kafka_ingress_egress_throughput_per_sec
                    .clone(),
                total_max_connections: self.kafka_total_max_connections,
                max_data_retention_size: self
                    .kafka_max_data_retention_size
                    .clone(),
                max_partitions: self.kafka_max_partitions,
                max_data_retention_period: self
                    .kafka_max_data_retention_period
                    .clone(),
                max_connection_attempts_per_sec: self
                    .kafka_max_connection_attempts_per_sec,
            },
            lifespan: KafkaLifespanConfig {
                enable_deletion_of_expired: self
                    .kafka_enable_deletion_of_expired,
                lifespan_hours: self.kafka_lifespan_hours,
                long_lived_kafkas: split_list(&self.kafka_long_lived_kafkas),
                check_interval: Duration::from_secs(
                    self.expiry_check_interval_secs.max(1),
                ),
            },
        }
    }

    pub fn keycloak(&self) -> KeycloakConfig {
        KeycloakConfig {
            enable_auth_on_kafka: self.keycloak_enable_auth_on_kafka,
            base_url: self.keycloak_base_url.trim_end_matches('/').to_string(),
            realm: self.keycloak_realm.clone(),
            client_id: self.keycloak_client_id.clone(),
            client_secret: self.keycloak_client_secret.clone(),
            user_name_claim: self.keycloak_user_name_claim.clone(),
            tls_trusted_certificate: self
                .keycloak_tls_trusted_cert
                .clone()
                .filter(|c| !c.trim().is_empty()),
        }
    }

    pub fn quota(&self) -> QuotaConfig {
        let quota_type = match self.quota_type.to_lowercase().as_str() {
            "allow-all" => QuotaType::AllowAll,
            "allow-list" => QuotaType::AllowList,
            other => {
                warn!(
                    "Unrecognized quota type '{}', falling back to 'allow-all'.",
                    other
                );
                QuotaType::AllowAll
            }
        };
        QuotaConfig {
            quota_type,
            allowed_organisations: split_list(
                &self.quota_allowed_organisations,
            ),
            allowed_owners: split_list(&self.quota_allowed_owners),
        }
    }

    /// Static cluster id to ingress DNS suffix map. Malformed entries are
    /// skipped with a warning.
    pub fn placement(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        for entry in self.cluster_dns.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once('=') {
                Some((id, suffix))
                    if !id.trim().is_empty() && !suffix.trim().is_empty() =>
                {
                    out.insert(
                        id.trim().to_string(),
                        suffix.trim().to_string(),
                    );
                }
                _ => warn!(entry = %entry, "Ignoring malformed CLUSTER_DNS entry"),
            }
        }
        out
    }

    pub fn storage(&self) -> StorageConfig {
        let storage_type = match self.storage_type.to_lowercase().as_str() {
            "memory" => StorageType::Memory,
            "sqlite" => StorageType::Sqlite,
            other => {
                warn!(
                    "Unrecognized storage type '{}', falling back to 'memory'.",
                    other
                );
                StorageType::Memory
            }
        };
        StorageConfig {
            sqlite_path: matches!(storage_type, StorageType::Sqlite)
                .then(|| self.sqlite_path.clone()),
            storage_type,
        }
    }

    pub fn observability(&self) -> ObservabilityConfig {
        ObservabilityConfig {
            log_level: self.log_level.clone(),
            json_format: self.log_format.eq_ignore_ascii_case("json"),
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub max_capacity: u64,
    pub enable_quota_service: bool,
    pub default_version: String,
    pub enable_external_certificate: bool,
    pub domain_name: String,
    pub num_of_brokers: usize,
    pub tls_cert: String,
    pub tls_key: String,
    pub capacity: KafkaCapacityConfig,
    pub lifespan: KafkaLifespanConfig,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            enable_quota_service: false,
            default_version: "2.7.0".to_string(),
            enable_external_certificate: false,
            domain_name: "kafka.example.com".to_string(),
            num_of_brokers: 3,
            tls_cert: String::new(),
            tls_key: String::new(),
            capacity: KafkaCapacityConfig::default(),
            lifespan: KafkaLifespanConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaCapacityConfig {
    pub ingress_egress_throughput_per_sec: String,
    pub total_max_connections: i32,
    pub max_data_retention_size: String,
    pub max_partitions: i32,
    pub max_data_retention_period: String,
    pub max_connection_attempts_per_sec: i32,
}

impl Default for KafkaCapacityConfig {
    fn default() -> Self {
        Self {
            ingress_egress_throughput_per_sec: "30Mi".to_string(),
            total_max_connections: 1000,
            max_data_retention_size: "100Gi".to_string(),
            max_partitions: 1000,
            max_data_retention_period: "P14D".to_string(),
            max_connection_attempts_per_sec: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaLifespanConfig {
    pub enable_deletion_of_expired: bool,
    pub lifespan_hours: i64,
    pub long_lived_kafkas: Vec<String>,
    pub check_interval: Duration,
}

impl Default for KafkaLifespanConfig {
    fn default() -> Self {
        Self {
            enable_deletion_of_expired: true,
            lifespan_hours: 48,
            long_lived_kafkas: Vec::new(),
            check_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeycloakConfig {
    pub enable_auth_on_kafka: bool,
    pub base_url: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
    pub user_name_claim: String,
    pub tls_trusted_certificate: Option<String>,
}

impl KeycloakConfig {
    pub fn realm_url(&self) -> String {
        format!("{}/auth/realms/{}", self.base_url, self.realm)
    }

    pub fn admin_url(&self) -> String {
        format!("{}/auth/admin/realms/{}", self.base_url, self.realm)
    }

    pub fn token_endpoint_uri(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    pub fn jwks_endpoint_uri(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.realm_url())
    }

    pub fn valid_issuer_uri(&self) -> String {
        self.realm_url()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaType {
    AllowAll,
    AllowList,
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub quota_type: QuotaType,
    pub allowed_organisations: Vec<String>,
    pub allowed_owners: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageType {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_format: bool,
}
