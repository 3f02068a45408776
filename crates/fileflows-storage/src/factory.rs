#[cfg(feature = "storage-s3")]
use crate::S3Store;
use crate::{RemoteStore, StorageResult};
use fileflows_core::S3Config;
use std::sync::Arc;

/// Create the remote store described by `config`
#[cfg(feature = "storage-s3")]
pub async fn create_remote_store(config: &S3Config) -> StorageResult<Arc<dyn RemoteStore>> {
    let store = S3Store::connect(config).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "storage-s3"))]
pub async fn create_remote_store(config: &S3Config) -> StorageResult<Arc<dyn RemoteStore>> {
    let _ = config;
    Err(crate::StorageError::ConfigError(
        "S3 remote store not available (storage-s3 feature not enabled)".to_string(),
    ))
}

#[cfg(all(test, not(feature = "storage-s3")))]
mod tests {
    use super::*;
    use crate::StorageError;

    #[tokio::test]
    async fn test_remote_store_requires_feature() {
        let result = create_remote_store(&S3Config::default()).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
