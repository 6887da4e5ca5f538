//! Partition storage backends.
//!
//! A store holds named partitions, each mapping request keys to cached
//! responses. Writes are whole-value overwrites and reads are snapshots, so
//! concurrent fetch handlers never need an external lock.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::CacheEntry;
use crate::{Error, Response};

/// Entry type stored in partitions.
pub type ResponseEntry = CacheEntry<Response>;

/// Backing storage for named partitions.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Create the partition if it does not exist.
    async fn create(&self, partition: &str) -> Result<(), Error>;

    /// Snapshot read. A missing partition reads as absent.
    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseEntry>, Error>;

    /// Full overwrite of `entry.key`. Recreates the partition if needed.
    async fn put(&self, partition: &str, entry: ResponseEntry) -> Result<(), Error>;

    async fn delete_entry(&self, partition: &str, key: &str) -> Result<bool, Error>;

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error>;

    async fn partition_names(&self) -> Result<Vec<String>, Error>;

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error>;
}

/// In-process partition store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<BTreeMap<String, BTreeMap<String, ResponseEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PartitionStore for MemoryStore {
    async fn create(&self, partition: &str) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        partitions.entry(partition.to_string()).or_default();
        Ok(())
    }

    async fn get(&self, partition: &str, key: &str) -> Result<Option<ResponseEntry>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions.get(partition).and_then(|entries| entries.get(key)).cloned())
    }

    async fn put(&self, partition: &str, entry: ResponseEntry) -> Result<(), Error> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn delete_entry(&self, partition: &str, key: &str) -> Result<bool, Error> {
        let mut partitions = self.partitions.write().await;
        Ok(partitions
            .get_mut(partition)
            .is_some_and(|entries| entries.remove(key).is_some()))
    }

    async fn keys(&self, partition: &str) -> Result<Vec<String>, Error> {
        let partitions = self.partitions.read().await;
        Ok(partitions
            .get(partition)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn partition_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.partitions.read().await.keys().cloned().collect())
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, Error> {
        Ok(self.partitions.write().await.remove(partition).is_some())
    }
}
