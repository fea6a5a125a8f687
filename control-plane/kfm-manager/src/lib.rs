pub mod auth;
pub mod bootstrap;
pub mod clients;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;
pub mod storage;

pub use auth::CallerIdentity;
pub use config::*;
pub use errors::*;
pub use models::*;
pub use services::{Collaborators, DnsRecordManager, KafkaService};
pub use storage::*;

pub use bootstrap::{
    build_kafka_service, build_kafka_service_from_env, build_kafka_service_with_dns,
};
