//! cache_fetch tool implementation.
//!
//! Routes one request through the worker, exactly as a page fetch would be.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::resolve;
use swcache_core::revalidate::CACHED_AT_HEADER;
use swcache_core::{Destination, Method, Request, WorkerLifecycleManager};

use super::{json_result, rfc3339};
use crate::error::ToolError;

/// Input parameters for the cache_fetch tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Anything but GET bypasses the cache.
    #[serde(default)]
    pub method: Option<String>,

    /// Request destination: document, image, script, style, font, manifest.
    #[serde(default)]
    pub destination: Option<String>,

    /// Treat as a full page load.
    #[serde(default)]
    pub navigate: bool,

    /// Qualifier appended to the cache key.
    #[serde(default)]
    pub variant: Option<String>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Output structure for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchOutput {
    pub url: String,
    pub status: u16,
    /// cache, network, cache-fallback, offline-fallback or passthrough.
    pub source: String,
    pub content_type: Option<String>,
    /// When the served copy was written to the cache.
    pub cached_at: Option<String>,
    pub body: String,
}

fn build_request(worker: &WorkerLifecycleManager, params: CacheFetchParams) -> Result<Request, ToolError> {
    let url = resolve(&params.url, Some(&worker.settings().origin)).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let mut request = if params.navigate { Request::navigate(url) } else { Request::get(url) };
    if let Some(method) = params.method.as_deref() {
        request = request.with_method(method.parse::<Method>().map_err(|e| ToolError::InvalidInput(e.to_string()))?);
    }
    if let Some(destination) = params.destination.as_deref() {
        request = request
            .with_destination(destination.parse::<Destination>().map_err(|e| ToolError::InvalidInput(e.to_string()))?);
    }
    if let Some(variant) = params.variant {
        request = request.with_variant(variant);
    }
    for (name, value) in params.headers {
        request = request.with_header(&name, value);
    }
    Ok(request)
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(worker: &WorkerLifecycleManager, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let request = build_request(worker, params)?;
    let outcome = worker.handle_fetch(&request).await?;
    let response = outcome.response();

    tracing::debug!(url = %request.url, source = outcome.source_label(), status = response.status, "cache_fetch");

    let output = CacheFetchOutput {
        url: request.url.to_string(),
        status: response.status,
        source: outcome.source_label().to_string(),
        content_type: response.content_type().map(str::to_string),
        cached_at: response
            .header(CACHED_AT_HEADER)
            .and_then(|v| v.parse().ok())
            .and_then(rfc3339),
        body: response.text(),
    };
    json_result(&output)
}
