use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

/// Product the admission path checks quota for.
pub const KAFKA_QUOTA_PRODUCT: &str = "RHOSAKTrial";
/// Billing tier of a standard instance.
pub const KAFKA_QUOTA_TIER: &str = "single";

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Quota service unavailable: {0}")]
    Unavailable(String),

    #[error("Quota service error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaReservation<'a> {
    pub product: &'a str,
    pub cluster_id: &'a str,
    pub reservation_id: &'a str,
    pub owner: &'a str,
    pub organisation_id: &'a str,
    /// `false` only checks whether the reservation would be granted.
    pub reserve: bool,
    pub tier: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub reservation_id: String,
}

#[async_trait]
pub trait QuotaAuthority: Send + Sync {
    async fn reserve(
        &self,
        request: &QuotaReservation<'_>,
    ) -> Result<QuotaDecision, QuotaError>;
}

/// Grants every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllQuotaAuthority;

#[async_trait]
impl QuotaAuthority for AllowAllQuotaAuthority {
    async fn reserve(
        &self,
        request: &QuotaReservation<'_>,
    ) -> Result<QuotaDecision, QuotaError> {
        Ok(QuotaDecision {
            allowed: true,
            reservation_id: request.reservation_id.to_string(),
        })
    }
}

/// Grants requests from listed organisations or listed owners only.
#[derive(Debug, Clone, Default)]
pub struct AllowListQuotaAuthority {
    organisations: HashSet<String>,
    owners: HashSet<String>,
}

impl AllowListQuotaAuthority {
    pub fn new(
        organisations: impl IntoIterator<Item = String>,
        owners: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            organisations: organisations.into_iter().collect(),
            owners: owners.into_iter().collect(),
        }
    }
}

#[async_trait]
impl QuotaAuthority for AllowListQuotaAuthority {
    async fn reserve(
        &self,
        request: &QuotaReservation<'_>,
    ) -> Result<QuotaDecision, QuotaError> {
        let allowed = self.owners.contains(request.owner)
            || (!request.organisation_id.is_empty()
                && self.organisations.contains(request.organisation_id));
        Ok(QuotaDecision {
            allowed,
            reservation_id: request.reservation_id.to_string(),
        })
    }
}
