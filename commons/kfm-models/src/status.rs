use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a Kafka request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum KafkaStatus {
    #[default]
    Accepted,
    Preparing,
    Provisioning,
    Ready,
    Failed,
    Deprovision,
    Deleting,
}

/// Statuses of records that are on their way out. Bulk deprovisioning and
/// field-scoped updates skip these.
pub const DELETION_STATUSES: [KafkaStatus; 2] =
    [KafkaStatus::Deleting, KafkaStatus::Deprovision];

/// Statuses for which a managed-kafka descriptor is handed to the cluster
/// reconciler.
pub const MANAGED_CR_STATUSES: [KafkaStatus; 4] = [
    KafkaStatus::Provisioning,
    KafkaStatus::Deprovision,
    KafkaStatus::Ready,
    KafkaStatus::Failed,
];

impl KafkaStatus {
    pub const ALL: [KafkaStatus; 7] = [
        KafkaStatus::Accepted,
        KafkaStatus::Preparing,
        KafkaStatus::Provisioning,
        KafkaStatus::Ready,
        KafkaStatus::Failed,
        KafkaStatus::Deprovision,
        KafkaStatus::Deleting,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KafkaStatus::Accepted => "accepted",
            KafkaStatus::Preparing => "preparing",
            KafkaStatus::Provisioning => "provisioning",
            KafkaStatus::Ready => "ready",
            KafkaStatus::Failed => "failed",
            KafkaStatus::Deprovision => "deprovision",
            KafkaStatus::Deleting => "deleting",
        }
    }

    /// Statuses reachable from `self` in a single step.
    pub fn allowed_next(&self) -> &'static [KafkaStatus] {
        use KafkaStatus::*;
        match self {
            Accepted => &[Preparing, Provisioning, Failed, Deprovision],
            Preparing => &[Provisioning, Failed, Deprovision],
            Provisioning => &[Ready, Failed, Deprovision],
            Ready => &[Failed, Deprovision],
            Failed => &[Deprovision],
            Deprovision => &[Deleting],
            Deleting => &[],
        }
    }

    pub fn can_transition_to(&self, next: KafkaStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_deleting(&self) -> bool {
        DELETION_STATUSES.contains(self)
    }
}

impl fmt::Display for KafkaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown kafka status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for KafkaStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KafkaStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaStatusCount {
    pub status: KafkaStatus,
    pub count: u64,
}
