use crate::error::StorageError;
use crate::filters::*;
use crate::traits::*;
use async_trait::async_trait;
use chrono::Utc;
use kfm_models::{KafkaRequest, KafkaRequestPatch, KafkaStatus, KafkaStatusCount};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type MemoryStore<T> = Arc<RwLock<HashMap<String, T>>>;

/// Process-local request store. Soft-deleted records stay in the map with
/// `deleted_at` set.
#[derive(Clone, Default)]
pub struct MemoryKafkaStorage {
    store: MemoryStore<KafkaRequest>,
}

impl MemoryKafkaStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl StorageHealth for MemoryKafkaStorage {
    async fn health(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl KafkaRequestStorage for MemoryKafkaStorage {
    async fn insert_request(&self, request: &KafkaRequest) -> StorageResult<()> {
        let mut store = self.store.write().await;
        if store.contains_key(&request.id) {
            return Err(StorageError::AlreadyExists(request.id.clone()));
        }
        store.insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn get_request(
        &self,
        id: &str,
        scope: Option<&OwnerScope>,
    ) -> StorageResult<Option<KafkaRequest>> {
        let store = self.store.read().await;
        Ok(store
            .get(id)
            .filter(|r| !r.is_deleted())
            .filter(|r| scope.is_none_or(|s| s.matches(r)))
            .cloned())
    }

    async fn count_requests(&self, filter: &RequestFilter) -> StorageResult<u64> {
        let store = self.store.read().await;
        Ok(store.values().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
        order_by: &[OrderBy],
        paging: Paging,
    ) -> StorageResult<Vec<KafkaRequest>> {
        let store = self.store.read().await;
        let mut requests: Vec<&KafkaRequest> =
            store.values().filter(|r| filter.matches(r)).collect();
        requests.sort_by(|a, b| OrderBy::compare_all(order_by, a, b));

        Ok(requests
            .into_iter()
            .skip(paging.offset as usize)
            .take(paging.limit as usize)
            .cloned()
            .collect())
    }

    async fn list_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .filter(|r| !r.is_deleted() && statuses.contains(&r.status))
            .cloned()
            .collect())
    }

    async fn list_by_cluster(
        &self,
        cluster_id: &str,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaRequest>> {
        let store = self.store.read().await;
        Ok(store
            .values()
            .filter(|r| {
                !r.is_deleted()
                    && r.cluster_id == cluster_id
                    && statuses.contains(&r.status)
            })
            .cloned()
            .collect())
    }

    async fn count_by_status(
        &self,
        statuses: &[KafkaStatus],
    ) -> StorageResult<Vec<KafkaStatusCount>> {
        let store = self.store.read().await;
        let mut counts: HashMap<KafkaStatus, u64> = HashMap::new();
        for r in store.values() {
            if !r.is_deleted() && statuses.contains(&r.status) {
                *counts.entry(r.status).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(status, count)| KafkaStatusCount { status, count })
            .collect())
    }

    async fn update_request(&self, patch: &KafkaRequestPatch) -> StorageResult<u64> {
        let mut store = self.store.write().await;
        match store.get_mut(&patch.id) {
            Some(r)
                if !r.is_deleted()
                    && !r.status.is_deleting()
                    && patch.expects(r.status) =>
            {
                r.apply(patch, Utc::now());
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn update_status(&self, id: &str, status: KafkaStatus) -> StorageResult<u64> {
        let mut store = self.store.write().await;
        match store.get_mut(id) {
            Some(r) if !r.is_deleted() => {
                r.status = status;
                r.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn deprovision_requests(
        &self,
        filter: &DeprovisionFilter,
    ) -> StorageResult<u64> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        let mut affected = 0u64;
        for r in store.values_mut().filter(|r| filter.matches(r)) {
            r.status = KafkaStatus::Deprovision;
            r.updated_at = now;
            affected += 1;
        }
        Ok(affected)
    }

    async fn soft_delete_request(&self, id: &str) -> StorageResult<u64> {
        let mut store = self.store.write().await;
        match store.get_mut(id) {
            Some(r) if !r.is_deleted() => {
                let now = Utc::now();
                r.deleted_at = Some(now);
                r.updated_at = now;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
