//! Partitioned response cache.
//!
//! This module provides:
//!
//! - [`CacheEntry`] with write timestamp, TTL and validator
//! - The [`PartitionStore`] seam with in-memory and SQLite backends
//! - [`CacheRegistry`] for opening partitions and collecting stale versions

pub mod connection;
pub mod entry;
pub mod hash;
pub mod migrations;
pub mod partitions;
pub mod registry;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entry::CacheEntry;
pub use registry::{CacheRegistry, Partition};
pub use store::{MemoryStore, PartitionStore, ResponseEntry};
