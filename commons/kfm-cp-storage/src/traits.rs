use crate::error::StorageError;
use crate::filters::{DeprovisionFilter, OrderBy, OwnerScope, Paging, RequestFilter};
use async_trait::async_trait;
use kfm_models::{KafkaRequest, KafkaRequestPatch, KafkaStatus, KafkaStatusCount};

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait StorageHealth: Send + Sync {
    /// Lightweight connectivity check to the backing store.
    async fn health(&self) -> StorageResult<()>;
}

/// Durable home of Kafka request records.
///
/// Soft-deleted records are invisible to every read and write below. Writes
/// that return `u64` report the number of records they changed.
#[async_trait]
pub trait KafkaRequestStorage: Send + Sync + StorageHealth {
    /// Persist a new record. Fails with `AlreadyExists` on an id clash.
    async fn insert_request(&self, request: &KafkaRequest) -> StorageResult<()>;

    async fn get_request(
        &self,
        id: &str,
        scope: Option<&OwnerScope>,
    ) -> StorageResult<Option<KafkaRequest>>;

    async fn count_requests(&self, filter: &RequestFilter) -> StorageResult<u64>;

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        order_by: &[OrderBy],
        paging: Paging,
    ) -> StorageResult<Vec<KafkaRequest>>;

    async fn list_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>>;

    async fn list_by_cluster(
        &self,
        cluster_id: &str,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>>;

    /// Counts per status for the requested statuses. Statuses without any
    /// record may be omitted.
    async fn count_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaStatusCount>>;

    /// Write only the fields present in the patch. Records that are
    /// deprovisioning or deleting are left untouched.
    async fn update_request(&self, patch: &KafkaRequestPatch) -> StorageResult<u64>;

    /// Unconditionally set the status column of a live record.
    async fn update_status(&self, id: &str, status: KafkaStatus) -> StorageResult<u64>;

    /// Move every record selected by the filter to `deprovision`.
    async fn deprovision_requests(
        &self,
        filter: &DeprovisionFilter,
    ) -> StorageResult<u64>;

    async fn soft_delete_request(&self, id: &str) -> StorageResult<u64>;
}
