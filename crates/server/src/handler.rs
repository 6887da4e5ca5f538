//! MCP server handler implementation.
//!
//! Exposes the worker's fetch handling, message protocol and partition
//! inspection as MCP tools.

use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
use crate::tools::{CacheFetchParams, check_for_updates_impl, fetch_impl, skip_waiting_impl, status_impl};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use swcache_core::WorkerLifecycleManager;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwcacheServer {
    worker: Arc<WorkerLifecycleManager>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SwcacheServer {
    pub fn new(worker: Arc<WorkerLifecycleManager>) -> Self {
        Self { worker, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Fetch a URL through the cache worker. Applies the routing policy and reports whether the response came from cache, network, a fallback, or passed through."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "Ask the worker for its version. Returns a VERSION_INFO message.")]
    async fn check_for_updates(&self) -> Result<CallToolResult, McpError> {
        check_for_updates_impl(&self.worker).await
    }

    #[tool(description = "Activate a waiting worker immediately.")]
    async fn skip_waiting(&self) -> Result<CallToolResult, McpError> {
        skip_waiting_impl(&self.worker).await
    }

    #[tool(description = "Report lifecycle state, version, partitions and connected clients.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.worker).await
    }

    #[tool(description = "Read one cached response from a partition without using the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.worker, params.0).await
    }

    #[tool(description = "Delete a partition by name and/or all stale partitions of older versions.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.worker, params.0).await
    }
}

impl ServerHandler for SwcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
