//! Contracts for the external tool-protocol client, and the tool type that
//! fronts one remotely discovered tool.

use crate::registry::{Tool, ToolOrigin, ToolResult};
use locus_core::{Result, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A tool as advertised by a remote server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RemoteToolInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
}

/// One live connection to a tool server.
#[async_trait::async_trait]
pub trait McpClient: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn list_tools(&self) -> Result<Vec<RemoteToolInfo>>;
    async fn call_tool(&self, name: &str, args: Value) -> Result<Value>;
    async fn disconnect(&self) -> Result<()>;
}

/// Builds unconnected clients from tool definitions. Returns
/// `Error::UnsupportedTransport` for transports it has no client for.
pub trait McpConnector: Send + Sync {
    fn client_for(&self, definition: &ToolDefinition) -> Result<Arc<dyn McpClient>>;
}

/// A connected server plus what it advertised at connect time.
pub struct McpConnection {
    pub tool_id: String,
    pub client: Arc<dyn McpClient>,
    pub tools: Vec<RemoteToolInfo>,
}

impl McpConnection {
    /// One [`Tool`] per advertised remote tool, all sharing the connection.
    pub fn as_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .iter()
            .map(|info| {
                Arc::new(McpTool {
                    tool_id: self.tool_id.clone(),
                    info: info.clone(),
                    client: self.client.clone(),
                }) as Arc<dyn Tool>
            })
            .collect()
    }
}

pub struct McpTool {
    tool_id: String,
    info: RemoteToolInfo,
    client: Arc<dyn McpClient>,
}

#[async_trait::async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str { &self.info.name }
    fn description(&self) -> &str { &self.info.description }
    fn input_schema(&self) -> Value { self.info.input_schema.clone() }

    fn origin(&self) -> ToolOrigin {
        ToolOrigin::Mcp { tool_id: self.tool_id.clone() }
    }

    async fn invoke(&self, args: Value) -> ToolResult {
        match self.client.call_tool(&self.info.name, args).await {
            Ok(Value::String(s)) => ToolResult::Text(s),
            Ok(v) => ToolResult::Json(v),
            Err(e) => ToolResult::Error(e.to_string()),
        }
    }
}
