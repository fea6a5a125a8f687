use crate::clients::{
    ChangeAction, ChangeBatch, ChangeInfo, DnsAuthority, RecordChange,
    ResourceRecordSet,
};
use crate::errors::ServiceError;
use kfm_models::KafkaRequest;
use std::sync::Arc;
use tracing::info;

pub const RECORD_TTL_SECS: u32 = 300;
const RECORD_TYPE: &str = "CNAME";

/// Builds and submits the CNAME records that expose an instance through its
/// cluster's load balancer.
#[derive(Clone)]
pub struct DnsRecordManager {
    authority: Arc<dyn DnsAuthority>,
    zone: String,
    num_of_brokers: usize,
}

impl DnsRecordManager {
    pub fn new(
        authority: Arc<dyn DnsAuthority>,
        zone: impl Into<String>,
        num_of_brokers: usize,
    ) -> Self {
        Self {
            authority,
            zone: zone.into(),
            num_of_brokers,
        }
    }

    /// One change each for the bootstrap host, the admin server and every
    /// broker, all pointing at `elb.<cluster_ingress>`.
    pub fn build_change_batch(
        &self,
        record_name: &str,
        cluster_ingress: &str,
        action: ChangeAction,
    ) -> ChangeBatch {
        let target = format!("elb.{cluster_ingress}");
        let mut changes = Vec::with_capacity(2 + self.num_of_brokers);
        changes.push(record_change(record_name.to_string(), &target, action));
        changes.push(record_change(
            format!("admin-server-{record_name}"),
            &target,
            action,
        ));
        for i in 0..self.num_of_brokers {
            changes.push(record_change(
                format!("broker-{i}-{record_name}"),
                &target,
                action,
            ));
        }
        ChangeBatch { changes }
    }

    pub async fn change_records(
        &self,
        request: &KafkaRequest,
        cluster_ingress: &str,
        action: ChangeAction,
    ) -> Result<ChangeInfo, ServiceError> {
        let batch = self.build_change_batch(
            &request.bootstrap_server_host,
            cluster_ingress,
            action,
        );
        let info = self
            .authority
            .submit_change_batch(&self.zone, &batch)
            .await
            .map_err(|e| {
                ServiceError::external_provisioning(
                    "Unable to change domain record sets",
                    e,
                )
            })?;
        info!(
            id = %request.id,
            action = %action,
            records = batch.changes.len(),
            change_id = %info.id,
            "submitted kafka CNAME records"
        );
        Ok(info)
    }
}

fn record_change(name: String, target: &str, action: ChangeAction) -> RecordChange {
    RecordChange {
        action,
        record_set: ResourceRecordSet {
            name,
            record_type: RECORD_TYPE.to_string(),
            ttl: RECORD_TTL_SECS,
            values: vec![target.to_string()],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryDnsAuthority;

    fn manager(brokers: usize) -> DnsRecordManager {
        DnsRecordManager::new(
            Arc::new(InMemoryDnsAuthority::new()),
            "kafka.example.com",
            brokers,
        )
    }

    #[test]
    fn three_brokers_yield_five_changes() {
        let batch = manager(3).build_change_batch(
            "orders-abc.kafka.example.com",
            "kas.c1.example.com",
            ChangeAction::Create,
        );
        let names: Vec<_> = batch
            .changes
            .iter()
            .map(|c| c.record_set.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "orders-abc.kafka.example.com",
                "admin-server-orders-abc.kafka.example.com",
                "broker-0-orders-abc.kafka.example.com",
                "broker-1-orders-abc.kafka.example.com",
                "broker-2-orders-abc.kafka.example.com",
            ]
        );
        for change in &batch.changes {
            assert_eq!(change.action, ChangeAction::Create);
            assert_eq!(change.record_set.ttl, 300);
            assert_eq!(change.record_set.record_type, "CNAME");
            assert_eq!(change.record_set.values, vec!["elb.kas.c1.example.com"]);
        }
    }

    #[test]
    fn zero_brokers_still_has_bootstrap_and_admin() {
        let batch = manager(0).build_change_batch("h", "i", ChangeAction::Delete);
        assert_eq!(batch.changes.len(), 2);
        assert!(batch.changes.iter().all(|c| c.action == ChangeAction::Delete));
    }
}
