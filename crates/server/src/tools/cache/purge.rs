//! cache_purge tool implementation.
//!
//! Deletes a named partition and/or every stale partition of this
//! application.

use std::collections::HashSet;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, WorkerLifecycleManager};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete this partition by full name.
    #[serde(default)]
    pub partition: Option<String>,

    /// Delete partitions of older versions of this application. Every
    /// partition of the running version is kept.
    #[serde(default)]
    pub stale: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Names of the partitions deleted.
    pub deleted: Vec<String>,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(worker: &WorkerLifecycleManager, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.partition.is_none() && !params.stale {
        return Err(Error::InvalidInput("At least one of partition or stale must be specified".to_string()).into());
    }

    let registry = worker.registry();
    let mut deleted = Vec::new();

    if let Some(partition) = params.partition
        && registry.delete_partition(&partition).await?
    {
        deleted.push(partition);
    }

    if params.stale {
        let names = worker.names();
        let keep: HashSet<String> = registry
            .list_partition_names()
            .await?
            .into_iter()
            .filter(|name| names.is_current(name))
            .collect();
        deleted.extend(registry.delete_stale_partitions(&keep).await?);
    }

    tracing::info!(?deleted, "cache_purge");
    json_result(&CachePurgeOutput { deleted })
}
