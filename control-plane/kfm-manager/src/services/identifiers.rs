//! Deterministic names derived from a Kafka request.

use kfm_models::KafkaRequest;
use thiserror::Error;

const TRUNCATED_NAME_LEN: usize = 10;
const MAX_LABEL_LEN: usize = 63;
const DEFAULT_INGRESS_PREFIX: &str = "apps";
const MANAGED_KAFKA_INGRESS_PREFIX: &str = "kas";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("'{0}' is not a valid DNS-1035 label")]
    InvalidLabel(String),
}

/// Host label of the instance: `<name, first 10 chars>-<id>`, normalized.
pub fn truncated_identifier(
    request: &KafkaRequest,
) -> Result<String, IdentifierError> {
    let name: String = request.name.chars().take(TRUNCATED_NAME_LEN).collect();
    to_dns_label(&format!("{}-{}", name, request.id.to_lowercase()))
}

/// Namespace on the data-plane cluster that holds the instance.
pub fn namespace_name(request: &KafkaRequest) -> Result<String, IdentifierError> {
    to_dns_label(&format!("kafka-{}", request.id.to_lowercase()))
}

/// Name of the per-instance OAuth client.
pub fn sso_client_name(id: &str) -> String {
    format!("kafka-{}", id.to_lowercase())
}

/// Claim check restricting broker access to the owning organisation.
pub fn custom_claim_check(organisation_id: &str) -> String {
    format!(
        "@.rh-org-id == '{organisation_id}'|| @.org_id == '{organisation_id}'"
    )
}

/// Swap the cluster's default ingress prefix for the managed kafka one.
pub fn managed_ingress(cluster_dns: &str) -> String {
    cluster_dns.replacen(DEFAULT_INGRESS_PREFIX, MANAGED_KAFKA_INGRESS_PREFIX, 1)
}

/// Lowercase and replace anything outside `[a-z0-9-]` with `-`, then
/// require a DNS-1035 label.
pub fn to_dns_label(raw: &str) -> Result<String, IdentifierError> {
    let label: String = raw
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => c,
            _ => '-',
        })
        .collect();
    if is_dns1035_label(&label) {
        Ok(label)
    } else {
        Err(IdentifierError::InvalidLabel(label))
    }
}

fn is_dns1035_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_lowercase()
                && (last.is_ascii_lowercase() || last.is_ascii_digit())
                && bytes.iter().all(|b| {
                    b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-'
                })
        }
        _ => false,
    }
}
