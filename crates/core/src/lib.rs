//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - TTL store for application-level caching
//! - Versioned partition registry with memory and SQLite backends
//! - Cache-first, network-first and stale-while-revalidate strategies
//! - Request routing and the worker lifecycle
//! - Unified error types and configuration

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod revalidate;
pub mod router;
pub mod strategy;
pub mod ttl;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheDb, CacheEntry, CacheRegistry, MemoryStore, Partition, PartitionStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Destination, Fetcher, Method, Request, RequestMode, Response};
pub use router::{Pattern, RouteRule, RouteSpec, Router};
pub use strategy::{Resolution, ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
pub use ttl::{Freshness, TtlStore};
pub use worker::{FetchOutcome, Message, WorkerLifecycleManager, WorkerSettings, WorkerState};
