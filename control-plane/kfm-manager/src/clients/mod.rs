//! Narrow capability interfaces for the external systems the lifecycle
//! service coordinates, plus the built-in implementations.

pub mod dns;
pub mod identity;
pub mod placement;
pub mod query;
pub mod quota;

pub use dns::{
    ChangeAction, ChangeBatch, ChangeInfo, DnsAuthority, DnsError,
    InMemoryDnsAuthority, RecordChange, ResourceRecordSet,
};
pub use identity::{
    IdentityConfig, IdentityError, IdentityRegistry, KeycloakIdentityRegistry,
};
pub use placement::{ClusterPlacement, PlacementError, StaticClusterPlacement};
pub use query::{DefaultQueryParser, QueryParser};
pub use quota::{
    AllowAllQuotaAuthority, AllowListQuotaAuthority, QuotaAuthority,
    QuotaDecision, QuotaError, QuotaReservation,
};
