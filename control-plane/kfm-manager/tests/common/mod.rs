#![allow(dead_code)]

use async_trait::async_trait;
use kfm_cp_storage::{KafkaRequestStorage, memory::MemoryKafkaStorage};
use kfm_manager::clients::{
    ChangeBatch, ChangeInfo, DefaultQueryParser, DnsAuthority, DnsError,
    IdentityConfig, IdentityError, IdentityRegistry, InMemoryDnsAuthority,
    QuotaAuthority, QuotaDecision, QuotaError, QuotaReservation,
    StaticClusterPlacement,
};
use kfm_manager::{CallerIdentity, Collaborators, KafkaConfig, KafkaService};
use kfm_models::KafkaRequest;
use std::sync::{Arc, Mutex};

pub const CLUSTER_ID: &str = "cluster-1";
pub const CLUSTER_DNS: &str = "apps.cluster-1.example.com";
pub const MANAGED_INGRESS: &str = "kas.cluster-1.example.com";

pub fn make_request(name: &str, owner: &str, org: &str) -> KafkaRequest {
    KafkaRequest::new(name, owner, org).with_placement("aws", "us-east-1", false)
}

pub fn alice() -> CallerIdentity {
    CallerIdentity::new("alice", "org-a")
}

pub fn bob() -> CallerIdentity {
    CallerIdentity::new("bob", "org-b")
}

/// Identity registry that remembers every call and fails on demand.
#[derive(Default)]
pub struct RecordingIdentity {
    config: IdentityConfig,
    pub created: Mutex<Vec<(String, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_create: bool,
    pub fail_delete: bool,
}

impl RecordingIdentity {
    pub fn new(auth_enabled: bool) -> Self {
        Self {
            config: IdentityConfig {
                auth_enabled,
                token_endpoint_uri: "https://sso.example.com/token".to_string(),
                jwks_endpoint_uri: "https://sso.example.com/certs".to_string(),
                valid_issuer_uri: "https://sso.example.com".to_string(),
                user_name_claim: "clientId".to_string(),
                tls_trusted_certificate: None,
            },
            ..Default::default()
        }
    }

    pub fn created_ids(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityRegistry for RecordingIdentity {
    fn config(&self) -> &IdentityConfig {
        &self.config
    }

    async fn create_client(
        &self,
        client_id: &str,
        organisation_id: &str,
    ) -> Result<String, IdentityError> {
        if self.fail_create {
            return Err(IdentityError::Status {
                status: 500,
                body: "keycloak exploded".to_string(),
            });
        }
        self.created
            .lock()
            .unwrap()
            .push((client_id.to_string(), organisation_id.to_string()));
        Ok(format!("secret-{client_id}"))
    }

    async fn delete_client(&self, client_id: &str) -> Result<(), IdentityError> {
        if self.fail_delete {
            return Err(IdentityError::Status {
                status: 503,
                body: "keycloak unavailable".to_string(),
            });
        }
        self.deleted.lock().unwrap().push(client_id.to_string());
        Ok(())
    }
}

/// Quota authority with a fixed answer that records the reservations it saw.
pub struct RecordingQuota {
    pub allowed: bool,
    pub fail: bool,
    pub calls: Mutex<Vec<RecordedReservation>>,
}

#[derive(Debug, Clone)]
pub struct RecordedReservation {
    pub product: String,
    pub owner: String,
    pub reservation_id: String,
    pub reserve: bool,
    pub tier: String,
}

impl RecordingQuota {
    pub fn new(allowed: bool) -> Self {
        Self {
            allowed,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedReservation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuotaAuthority for RecordingQuota {
    async fn reserve(
        &self,
        request: &QuotaReservation<'_>,
    ) -> Result<QuotaDecision, QuotaError> {
        self.calls.lock().unwrap().push(RecordedReservation {
            product: request.product.to_string(),
            owner: request.owner.to_string(),
            reservation_id: request.reservation_id.to_string(),
            reserve: request.reserve,
            tier: request.tier.to_string(),
        });
        if self.fail {
            return Err(QuotaError::Unavailable("ams is down".to_string()));
        }
        Ok(QuotaDecision {
            allowed: self.allowed,
            reservation_id: request.reservation_id.to_string(),
        })
    }
}

pub struct FailingDns;

#[async_trait]
impl DnsAuthority for FailingDns {
    async fn submit_change_batch(
        &self,
        zone: &str,
        _batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        Err(DnsError::ZoneNotFound(zone.to_string()))
    }
}

pub struct Harness {
    pub service: Arc<KafkaService>,
    pub storage: Arc<MemoryKafkaStorage>,
    pub dns: InMemoryDnsAuthority,
    pub identity: Arc<RecordingIdentity>,
    pub quota: Arc<RecordingQuota>,
}

impl Harness {
    /// Insert a record directly, bypassing admission.
    pub async fn seed(&self, request: &KafkaRequest) {
        self.storage.insert_request(request).await.unwrap();
    }

    pub async fn stored(&self, id: &str) -> Option<KafkaRequest> {
        self.storage.get_request(id, None).await.unwrap()
    }
}

pub struct HarnessBuilder {
    config: KafkaConfig,
    identity: RecordingIdentity,
    quota: RecordingQuota,
    failing_dns: bool,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: KafkaConfig::default(),
            identity: RecordingIdentity::new(false),
            quota: RecordingQuota::new(true),
            failing_dns: false,
        }
    }
}

impl HarnessBuilder {
    pub fn config(mut self, f: impl FnOnce(&mut KafkaConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn auth(mut self, enabled: bool) -> Self {
        self.identity = RecordingIdentity::new(enabled);
        self
    }

    pub fn identity(mut self, f: impl FnOnce(&mut RecordingIdentity)) -> Self {
        f(&mut self.identity);
        self
    }

    pub fn quota(mut self, quota: RecordingQuota) -> Self {
        self.config.enable_quota_service = true;
        self.quota = quota;
        self
    }

    pub fn failing_dns(mut self) -> Self {
        self.failing_dns = true;
        self
    }

    pub fn build(self) -> Harness {
        let storage = Arc::new(MemoryKafkaStorage::new());
        let dns = InMemoryDnsAuthority::new();
        let identity = Arc::new(self.identity);
        let quota = Arc::new(self.quota);

        let dns_authority: Arc<dyn DnsAuthority> = if self.failing_dns {
            Arc::new(FailingDns)
        } else {
            Arc::new(dns.clone())
        };
        let collaborators = Collaborators {
            placement: Arc::new(
                StaticClusterPlacement::default().with_cluster(CLUSTER_ID, CLUSTER_DNS),
            ),
            quota: quota.clone(),
            identity: identity.clone(),
            dns: dns_authority,
            query_parser: Arc::new(DefaultQueryParser),
        };
        let service = Arc::new(KafkaService::new(
            storage.clone(),
            collaborators,
            self.config,
        ));

        Harness {
            service,
            storage,
            dns,
            identity,
            quota,
        }
    }
}
