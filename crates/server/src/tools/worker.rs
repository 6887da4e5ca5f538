//! Worker message protocol and status tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Message, WorkerLifecycleManager, WorkerState};
use tokio::sync::oneshot;

use super::json_result;
use crate::error::ToolError;

/// Output structure for the skip_waiting tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SkipWaitingOutput {
    /// Worker state after the message was handled.
    pub state: WorkerState,
}

/// Output structure for the worker_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub state: WorkerState,
    pub version: String,
    /// `{app}-v{version}` prefix of this version's partitions.
    pub umbrella: String,
    /// Every partition in the store, including other applications'.
    pub partitions: Vec<String>,
    pub clients: usize,
}

/// Send CHECK_FOR_UPDATES and return the VERSION_INFO reply.
pub async fn check_for_updates_impl(worker: &WorkerLifecycleManager) -> Result<CallToolResult, McpError> {
    let (tx, rx) = oneshot::channel();
    worker.post_message(Message::CheckForUpdates, Some(tx)).await?;
    let reply = rx
        .await
        .map_err(|_| ToolError::Internal("worker did not answer CHECK_FOR_UPDATES".into()))?;
    json_result(&reply)
}

/// Send SKIP_WAITING.
pub async fn skip_waiting_impl(worker: &WorkerLifecycleManager) -> Result<CallToolResult, McpError> {
    worker.post_message(Message::SkipWaiting, None).await?;
    json_result(&SkipWaitingOutput { state: worker.state().await })
}

pub async fn status_impl(worker: &WorkerLifecycleManager) -> Result<CallToolResult, McpError> {
    let output = WorkerStatusOutput {
        state: worker.state().await,
        version: worker.version().to_string(),
        umbrella: worker.names().umbrella().to_string(),
        partitions: worker.registry().list_partition_names().await?,
        clients: worker.clients().len().await,
    };
    json_result(&output)
}
