//! cache_get tool implementation.
//!
//! Reads one entry of one partition without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::cache::hash::body_digest;
use swcache_core::{Error, Request, WorkerLifecycleManager};

use crate::error::ToolError;
use crate::tools::{json_result, rfc3339};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// URL or origin-relative path of the cached request.
    pub url: String,

    /// Full partition name (default: this version's static partition).
    #[serde(default)]
    pub partition: Option<String>,

    /// Cache key qualifier used when the entry was stored.
    #[serde(default)]
    pub variant: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    pub key: String,
    pub status: u16,
    pub stored_at: Option<String>,
    pub ttl_ms: u64,
    pub etag: Option<String>,
    /// SHA-256 of the body, hex encoded.
    pub digest: String,
    pub content_type: Option<String>,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(worker: &WorkerLifecycleManager, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(&params.url, Some(&worker.settings().origin)).map_err(|e| ToolError::InvalidInput(e.to_string()))?;
    let mut request = Request::get(url);
    if let Some(variant) = params.variant {
        request = request.with_variant(variant);
    }

    let partition = params.partition.unwrap_or_else(|| worker.names().static_partition());
    let key = request.cache_key();
    let entry = worker
        .registry()
        .match_entry(&partition, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{key} in {partition}")))?;

    let output = CacheGetOutput {
        partition,
        key,
        status: entry.value.status,
        stored_at: entry.stored_at.and_then(rfc3339),
        ttl_ms: entry.ttl_ms,
        etag: entry.etag,
        digest: body_digest(&entry.value.body),
        content_type: entry.value.content_type().map(str::to_string),
        body: entry.value.text(),
    };
    json_result(&output)
}
