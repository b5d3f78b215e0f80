use sn_core::config::{StorageBackendKind, StorageConfig};
use sn_core::{ArticleStorage, Error, Result};
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

/// Opens the backend named by the storage config.
pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ArticleStorage>> {
    match config.backend {
        StorageBackendKind::Memory => {
            info!("💾 Using in-memory storage; nothing survives the process");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageBackendKind::Sqlite => {
            let storage = SQLiteStorage::new_with_path(&config.path).await?;
            info!(path = %config.path.display(), "💾 Using SQLite storage");
            Ok(Arc::new(storage))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackendKind::Sqlite => Err(Error::Configuration(
            "SQLite storage requested but the `sqlite` feature is disabled".to_string(),
        )),
    }
}

/// Fails fast when a backend cannot serve a trivial read.
pub async fn check_storage(storage: &dyn ArticleStorage) -> Result<()> {
    storage
        .list_runs(1)
        .await
        .map(|_| ())
        .map_err(|e| Error::Storage(format!("Storage health check failed: {}", e)))
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::create_storage;
    pub use sn_core::{Article, ArticleStorage, UpsertOutcome};
}
