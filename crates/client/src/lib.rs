//! Client code for swcache.
//!
//! This crate provides the reqwest-backed network fetcher used by the worker
//! and the application query cache used by foreground code.

pub mod fetch;
pub mod query;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve};
pub use query::{DEFAULT_QUERY_TIMEOUT, Progress, QueryCache};
