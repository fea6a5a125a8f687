use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacementError {
    #[error("Cluster not found: {0}")]
    ClusterNotFound(String),

    #[error("Placement service error: {0}")]
    Backend(String),
}

/// Source of the ingress DNS suffix of a physical data-plane cluster.
#[async_trait]
pub trait ClusterPlacement: Send + Sync {
    async fn cluster_dns(&self, cluster_id: &str) -> Result<String, PlacementError>;
}

/// Placement backed by a fixed cluster id to DNS suffix map.
#[derive(Debug, Clone, Default)]
pub struct StaticClusterPlacement {
    clusters: HashMap<String, String>,
}

impl StaticClusterPlacement {
    pub fn new(clusters: HashMap<String, String>) -> Self {
        Self { clusters }
    }

    pub fn with_cluster(
        mut self,
        cluster_id: impl Into<String>,
        dns: impl Into<String>,
    ) -> Self {
        self.clusters.insert(cluster_id.into(), dns.into());
        self
    }
}

#[async_trait]
impl ClusterPlacement for StaticClusterPlacement {
    async fn cluster_dns(&self, cluster_id: &str) -> Result<String, PlacementError> {
        self.clusters
            .get(cluster_id)
            .cloned()
            .ok_or_else(|| PlacementError::ClusterNotFound(cluster_id.to_string()))
    }
}
