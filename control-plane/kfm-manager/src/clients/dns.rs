use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "CREATE",
            ChangeAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecordSet {
    pub name: String,
    pub record_type: String,
    pub ttl: u32,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordChange {
    pub action: ChangeAction,
    pub record_set: ResourceRecordSet,
}

/// Record changes applied by the authority as a single unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    pub changes: Vec<RecordChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeInfo {
    pub id: String,
    pub status: String,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("Hosted zone not found: {0}")]
    ZoneNotFound(String),

    #[error("Invalid change batch: {0}")]
    InvalidChangeBatch(String),

    #[error("DNS authority error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait DnsAuthority: Send + Sync {
    async fn submit_change_batch(
        &self,
        zone: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError>;
}

type ZoneStore = Arc<RwLock<HashMap<String, BTreeMap<String, ResourceRecordSet>>>>;

/// Process-local DNS authority. `CREATE` upserts and `DELETE` of a missing
/// record is a no-op.
#[derive(Clone, Default)]
pub struct InMemoryDnsAuthority {
    zones: ZoneStore,
}

impl InMemoryDnsAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self, zone: &str) -> Vec<ResourceRecordSet> {
        self.zones
            .read()
            .await
            .get(zone)
            .map(|z| z.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn record(
        &self,
        zone: &str,
        name: &str,
    ) -> Option<ResourceRecordSet> {
        self.zones
            .read()
            .await
            .get(zone)
            .and_then(|z| z.get(name).cloned())
    }
}

#[async_trait]
impl DnsAuthority for InMemoryDnsAuthority {
    async fn submit_change_batch(
        &self,
        zone: &str,
        batch: &ChangeBatch,
    ) -> Result<ChangeInfo, DnsError> {
        if batch.changes.is_empty() {
            return Err(DnsError::InvalidChangeBatch(
                "change batch has no changes".to_string(),
            ));
        }
        let mut zones = self.zones.write().await;
        let records = zones.entry(zone.to_string()).or_default();
        for change in &batch.changes {
            match change.action {
                ChangeAction::Create => {
                    records.insert(
                        change.record_set.name.clone(),
                        change.record_set.clone(),
                    );
                }
                ChangeAction::Delete => {
                    records.remove(&change.record_set.name);
                }
            }
        }
        Ok(ChangeInfo {
            id: uuid::Uuid::new_v4().to_string(),
            status: "INSYNC".to_string(),
            submitted_at: Utc::now(),
        })
    }
}
