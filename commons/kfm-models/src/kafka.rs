use crate::status::KafkaStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3',
    '4', '5', '6', '7', '8', '9',
];

/// Generate a fresh record id. Ids are lowercase alphanumeric so they can be
/// embedded in host labels and namespace names unchanged.
pub fn generate_id() -> String {
    nanoid::nanoid!(20, &ID_ALPHABET)
}

/// A managed Kafka instance request and everything the control plane knows
/// about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct KafkaRequest {
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub organisation_id: String,
    #[serde(default)]
    pub placement_id: String,

    // desired configuration
    pub region: String,
    pub cloud_provider: String,
    #[serde(default)]
    pub multi_az: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub kafka_storage_size: String,
    #[serde(default)]
    pub ingress_throughput_per_sec: String,
    #[serde(default)]
    pub egress_throughput_per_sec: String,
    #[serde(default)]
    pub total_max_connections: i32,
    #[serde(default)]
    pub max_partitions: i32,
    #[serde(default)]
    pub max_data_retention_period: String,
    #[serde(default)]
    pub max_connection_attempts_per_sec: i32,
    #[serde(default)]
    pub reauthentication_enabled: bool,

    // provisioning outputs
    #[serde(default)]
    pub bootstrap_server_host: String,
    #[serde(default)]
    pub admin_api_server_url: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default)]
    pub sso_client_id: String,
    #[serde(default, skip_serializing)]
    pub sso_client_secret: String,

    // lifecycle
    #[serde(default)]
    pub status: KafkaStatus,
    #[serde(default)]
    pub failed_reason: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl KafkaRequest {
    /// A new request in `accepted` status with a generated id and creation
    /// timestamps set to now.
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        organisation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            name: name.into(),
            owner: owner.into(),
            organisation_id: organisation_id.into(),
            created_at: now,
            updated_at: now,
            ..Default::default()
        }
    }

    pub fn with_placement(
        mut self,
        cloud_provider: impl Into<String>,
        region: impl Into<String>,
        multi_az: bool,
    ) -> Self {
        self.cloud_provider = cloud_provider.into();
        self.region = region.into();
        self.multi_az = multi_az;
        self
    }

    pub fn has_cluster(&self) -> bool {
        !self.cluster_id.is_empty()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a field-scoped patch. Only the fields present in the patch are
    /// touched.
    pub fn apply(&mut self, patch: &KafkaRequestPatch, now: DateTime<Utc>) {
        if let Some(ref v) = patch.bootstrap_server_host {
            self.bootstrap_server_host = v.clone();
        }
        if let Some(ref v) = patch.admin_api_server_url {
            self.admin_api_server_url = v.clone();
        }
        if let Some(ref v) = patch.cluster_id {
            self.cluster_id = v.clone();
        }
        if let Some(ref v) = patch.sso_client_id {
            self.sso_client_id = v.clone();
        }
        if let Some(ref v) = patch.sso_client_secret {
            self.sso_client_secret = v.clone();
        }
        if let Some(ref v) = patch.failed_reason {
            self.failed_reason = v.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        self.updated_at = now;
    }
}

/// Sparse update of a [`KafkaRequest`]. Fields left as `None` are not
/// written, so concurrent writers touching disjoint fields do not clobber
/// each other.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KafkaRequestPatch {
    pub id: String,
    pub bootstrap_server_host: Option<String>,
    pub admin_api_server_url: Option<String>,
    pub cluster_id: Option<String>,
    pub sso_client_id: Option<String>,
    pub sso_client_secret: Option<String>,
    pub failed_reason: Option<String>,
    pub status: Option<KafkaStatus>,
    /// When non-empty, the patch only lands while the stored status is one
    /// of these.
    pub expected_statuses: Vec<KafkaStatus>,
}

impl KafkaRequestPatch {
    pub fn for_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bootstrap_server_host.is_none()
            && self.admin_api_server_url.is_none()
            && self.cluster_id.is_none()
            && self.sso_client_id.is_none()
            && self.sso_client_secret.is_none()
            && self.failed_reason.is_none()
            && self.status.is_none()
    }

    /// Whether a record currently in `status` may take this patch.
    pub fn expects(&self, status: KafkaStatus) -> bool {
        self.expected_statuses.is_empty()
            || self.expected_statuses.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_host_safe() {
        let id = generate_id();
        assert_eq!(id.len(), 20);
        assert!(
            id.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn patch_touches_only_present_fields() {
        let mut req = KafkaRequest::new("my-kafka", "u1", "org1");
        req.failed_reason = "keep".into();
        let mut patch = KafkaRequestPatch::for_id(&req.id);
        patch.bootstrap_server_host = Some("host".into());
        patch.status = Some(KafkaStatus::Provisioning);
        req.apply(&patch, Utc::now());
        assert_eq!(req.bootstrap_server_host, "host");
        assert_eq!(req.status, KafkaStatus::Provisioning);
        assert_eq!(req.failed_reason, "keep");
        assert!(!patch.is_empty());
        assert!(KafkaRequestPatch::for_id("x").is_empty());
    }

    #[test]
    fn secret_is_not_serialized() {
        let mut req = KafkaRequest::new("k", "u1", "");
        req.sso_client_secret = "s3cr3t".into();
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("s3cr3t"));
    }
}
