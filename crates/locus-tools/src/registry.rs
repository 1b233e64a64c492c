//! Tool trait and the per-agent tool set
//!
//! A tool is a capability with a name, a description, an input schema and
//! an `invoke`. Remote (MCP-discovered) and in-process builtin tools both
//! implement the same trait; `origin()` tells them apart.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Error(String),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self { Self::Text(s.into()) }
    pub fn error(s: impl Into<String>) -> Self { Self::Error(s.into()) }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Error(e) => format!("Error: {}", e),
        }
    }

    pub fn is_error(&self) -> bool { matches!(self, Self::Error(_)) }
}

/// Where a tool came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOrigin {
    /// Discovered on the connection declared by tool definition `tool_id`.
    Mcp { tool_id: String },
    Builtin { tool_id: String },
}

impl ToolOrigin {
    pub fn tool_id(&self) -> &str {
        match self {
            Self::Mcp { tool_id } | Self::Builtin { tool_id } => tool_id,
        }
    }
}

#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Name the agent sees and calls.
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    fn origin(&self) -> ToolOrigin;

    async fn invoke(&self, args: Value) -> ToolResult;
}

/// Presents a tool under a different name. Invocation goes to the wrapped
/// tool untouched.
pub struct AliasedTool {
    alias: String,
    inner: Arc<dyn Tool>,
}

impl AliasedTool {
    pub fn new(alias: impl Into<String>, inner: Arc<dyn Tool>) -> Self {
        Self { alias: alias.into(), inner }
    }

    pub fn original_name(&self) -> &str {
        self.inner.name()
    }
}

#[async_trait::async_trait]
impl Tool for AliasedTool {
    fn name(&self) -> &str { &self.alias }
    fn description(&self) -> &str { self.inner.description() }
    fn input_schema(&self) -> Value { self.inner.input_schema() }
    fn origin(&self) -> ToolOrigin { self.inner.origin() }

    async fn invoke(&self, args: Value) -> ToolResult {
        self.inner.invoke(args).await
    }
}

/// The resolved tools of one agent, keyed by exposed name.
#[derive(Default, Clone)]
pub struct ToolSet {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self { Self::default() }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!("Tool '{}' registered twice; keeping the later one", name);
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn invoke(&self, name: &str, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.invoke(args).await,
            None => ToolResult::Error(format!("Tool not found: {}", name)),
        }
    }

    /// Names in sorted order.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.values()
    }

    pub fn len(&self) -> usize { self.tools.len() }
    pub fn is_empty(&self) -> bool { self.tools.is_empty() }
}
