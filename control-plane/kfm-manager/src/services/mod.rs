pub mod dns;
pub mod identifiers;
pub mod kafka;

pub use dns::DnsRecordManager;
pub use kafka::{Collaborators, KafkaService};
