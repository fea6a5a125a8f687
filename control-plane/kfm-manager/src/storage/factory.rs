use crate::config::{StorageConfig, StorageType};
use anyhow::Result;
use kfm_cp_storage::{KafkaRequestStorage, memory::MemoryKafkaStorage};
use std::sync::Arc;
use tracing::info;

/// Open the request store selected by configuration.
pub fn create_kafka_storage(
    config: &StorageConfig,
) -> Result<Arc<dyn KafkaRequestStorage>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("using in-memory kafka request storage");
            Ok(Arc::new(MemoryKafkaStorage::new()))
        }
        StorageType::Sqlite => open_sqlite(config.sqlite_path.as_deref()),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(path: Option<&str>) -> Result<Arc<dyn KafkaRequestStorage>> {
    use kfm_cp_storage::sqlite::SqliteKafkaStorage;

    let storage = match path {
        Some(path) => {
            info!(path = %path, "using sqlite kafka request storage");
            SqliteKafkaStorage::open(path)?
        }
        None => SqliteKafkaStorage::open_in_memory()?,
    };
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_path: Option<&str>) -> Result<Arc<dyn KafkaRequestStorage>> {
    anyhow::bail!("sqlite storage requested but kfm-manager was built without the `sqlite` feature")
}
