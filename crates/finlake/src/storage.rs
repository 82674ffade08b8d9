//!
//! Object storage access for the lake.
//!
//! Handlers never talk to S3 directly, they ask a [StoreProvider] for the [ObjectStore] of a
//! bucket. In Lambda that is [S3Stores], tests use [MemoryStores] and local runs can use
//! [LocalStores].
//!

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::log::*;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::error::LakeResult;
use crate::location::ObjectLocation;

/// Hands out an [ObjectStore] rooted at the given bucket
pub trait StoreProvider: Send + Sync {
    fn store_for(&self, bucket: &str) -> LakeResult<Arc<dyn ObjectStore>>;
}

/// [StoreProvider] backed by Amazon S3, configured from the `AWS_*` environment variables the
/// Lambda runtime provides
#[derive(Clone, Debug, Default)]
pub struct S3Stores;

impl StoreProvider for S3Stores {
    fn store_for(&self, bucket: &str) -> LakeResult<Arc<dyn ObjectStore>> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Arc::new(store))
    }
}

/// [StoreProvider] which keeps one [InMemory] store per bucket for the life of the provider
#[derive(Debug, Default)]
pub struct MemoryStores {
    stores: Mutex<HashMap<String, Arc<InMemory>>>,
}

impl StoreProvider for MemoryStores {
    fn store_for(&self, bucket: &str) -> LakeResult<Arc<dyn ObjectStore>> {
        let mut stores = self.stores.lock().unwrap_or_else(|e| e.into_inner());
        let store: Arc<dyn ObjectStore> = stores
            .entry(bucket.to_string())
            .or_insert_with(|| Arc::new(InMemory::new()))
            .clone();
        Ok(store)
    }
}

/// [StoreProvider] which maps every bucket onto a directory of the same name under `root`
#[derive(Clone, Debug)]
pub struct LocalStores {
    root: PathBuf,
}

impl LocalStores {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StoreProvider for LocalStores {
    fn store_for(&self, bucket: &str) -> LakeResult<Arc<dyn ObjectStore>> {
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir)?;
        Ok(Arc::new(LocalFileSystem::new_with_prefix(dir)?))
    }
}

/// Read the whole object at `location` into memory
pub async fn read_object(
    provider: &dyn StoreProvider,
    location: &ObjectLocation,
) -> LakeResult<Bytes> {
    let store = provider.store_for(&location.bucket)?;
    debug!("Reading {location}");
    let result = store.get(&Path::parse(&location.key)?).await?;
    Ok(result.bytes().await?)
}

/// Put `payload` at `location`, replacing whatever was there
pub async fn put_object(
    provider: &dyn StoreProvider,
    location: &ObjectLocation,
    payload: impl Into<PutPayload>,
) -> LakeResult<()> {
    let store = provider.store_for(&location.bucket)?;
    info!("Uploading to {location}");
    store.put(&Path::parse(&location.key)?, payload.into()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_round_trip_is_per_bucket() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let here = ObjectLocation::new("bucket-a", "some/key.json");
        let there = ObjectLocation::new("bucket-b", "some/key.json");

        put_object(&stores, &here, "{}".to_string()).await?;
        assert_eq!(read_object(&stores, &here).await?.as_ref(), b"{}");
        assert!(read_object(&stores, &there).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_local_stores_use_bucket_directories() -> LakeResult<()> {
        let dir = tempfile::tempdir()?;
        let stores = LocalStores::new(dir.path());
        let loc = ObjectLocation::new("lake", "datalake/forex_hourly/date=2024-01-02/a.json");
        put_object(&stores, &loc, "{}".to_string()).await?;

        let on_disk = dir
            .path()
            .join("lake/datalake/forex_hourly/date=2024-01-02/a.json");
        assert!(on_disk.exists());
        assert_eq!(read_object(&stores, &loc).await?.as_ref(), b"{}");
        Ok(())
    }

    #[tokio::test]
    async fn test_put_overwrites() -> LakeResult<()> {
        let stores = MemoryStores::default();
        let loc = ObjectLocation::new("bucket", "datalake/date=2024-01-01/a.json");
        put_object(&stores, &loc, "first".to_string()).await?;
        put_object(&stores, &loc, "second".to_string()).await?;
        assert_eq!(read_object(&stores, &loc).await?.as_ref(), b"second");
        Ok(())
    }
}
