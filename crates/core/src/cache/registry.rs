//! Named, versioned partitions and their garbage collection.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::store::{MemoryStore, PartitionStore, ResponseEntry};
use crate::Error;

/// Registry of partitions belonging to one application.
///
/// `prefix` is the app name; only partitions named `{prefix}-v{version}` or
/// `{prefix}-v{version}-{suffix}` are ever garbage collected.
#[derive(Clone)]
pub struct CacheRegistry {
    store: Arc<dyn PartitionStore>,
    prefix: String,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

impl CacheRegistry {
    pub fn new(store: Arc<dyn PartitionStore>, prefix: impl Into<String>) -> Self {
        Self { store, prefix: prefix.into() }
    }

    /// Registry over a fresh [`MemoryStore`].
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Open a partition, creating it if absent. Idempotent.
    pub async fn open(&self, name: &str) -> Result<Partition, Error> {
        self.store.create(name).await?;
        Ok(Partition { name: name.to_string(), store: Arc::clone(&self.store) })
    }

    pub async fn match_entry(&self, partition: &str, key: &str) -> Result<Option<ResponseEntry>, Error> {
        self.store.get(partition, key).await
    }

    /// Upsert `entry` under `entry.key`.
    pub async fn put(&self, partition: &str, entry: ResponseEntry) -> Result<(), Error> {
        self.store.put(partition, entry).await
    }

    pub async fn list_partition_names(&self) -> Result<Vec<String>, Error> {
        self.store.partition_names().await
    }

    pub async fn delete_partition(&self, name: &str) -> Result<bool, Error> {
        self.store.delete_partition(name).await
    }

    /// Whether `name` is a versioned partition of this application.
    ///
    /// The version is a non-empty run of digits and dots, followed by either
    /// the end of the name or a `-suffix`.
    pub fn owns(&self, name: &str) -> bool {
        let Some(rest) = name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix("-v"))
        else {
            return false;
        };
        let version_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        version_len > 0 && (version_len == rest.len() || rest[version_len..].starts_with('-'))
    }

    /// Delete every owned partition not listed in `current`.
    ///
    /// Returns the deleted names. Partitions outside the umbrella are never
    /// touched.
    pub async fn delete_stale_partitions(&self, current: &HashSet<String>) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.list_partition_names().await? {
            if !self.owns(&name) || current.contains(&name) {
                continue;
            }
            if self.store.delete_partition(&name).await? {
                tracing::info!(partition = %name, "deleted stale partition");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

/// Handle to one named partition.
///
/// Two handles opened with the same name see the same entries.
#[derive(Clone)]
pub struct Partition {
    name: String,
    store: Arc<dyn PartitionStore>,
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Partition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn get(&self, key: &str) -> Result<Option<ResponseEntry>, Error> {
        self.store.get(&self.name, key).await
    }

    pub async fn put(&self, entry: ResponseEntry) -> Result<(), Error> {
        self.store.put(&self.name, entry).await
    }

    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        self.store.delete_entry(&self.name, key).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        self.store.keys(&self.name).await
    }
}
