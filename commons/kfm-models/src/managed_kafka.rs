//! Deployment descriptor handed to the data-plane reconciler for each Kafka
//! request placed on a cluster.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANAGED_KAFKA_KIND: &str = "ManagedKafka";
pub const MANAGED_KAFKA_API_VERSION: &str = "managedkafka.bf2.org/v1alpha1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedKafka {
    pub id: String,
    pub kind: String,
    pub api_version: String,
    pub metadata: ObjectMeta,
    pub spec: ManagedKafkaSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedKafkaSpec {
    pub capacity: Capacity,
    pub endpoint: EndpointSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth: Option<OAuthSpec>,
    pub versions: VersionsSpec,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capacity {
    pub ingress_egress_throughput_per_sec: String,
    pub total_max_connections: i32,
    pub max_data_retention_size: String,
    pub max_partitions: i32,
    pub max_data_retention_period: String,
    pub max_connection_attempts_per_sec: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
    pub bootstrap_server_host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TlsSpec {
    pub cert: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSpec {
    pub client_id: String,
    pub client_secret: String,
    #[serde(rename = "tokenEndpointURI")]
    pub token_endpoint_uri: String,
    #[serde(rename = "jwksEndpointURI")]
    pub jwks_endpoint_uri: String,
    #[serde(rename = "validIssuerEndpointURI")]
    pub valid_issuer_endpoint_uri: String,
    pub user_name_claim: String,
    pub custom_claim_check: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_trusted_certificate: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionsSpec {
    pub kafka: String,
    pub strimzi: String,
}
