//! Locus Tools - tool capability trait, remote tool contracts, and the
//! cached per-agent tool loader

pub mod builtin;
pub mod loader;
pub mod mcp;
pub mod registry;

pub use builtin::{BuiltinCatalog, BuiltinToolFactory};
pub use loader::{LoadedTools, ToolLoader};
pub use mcp::{McpClient, McpConnection, McpConnector, McpTool, RemoteToolInfo};
pub use registry::{AliasedTool, Tool, ToolOrigin, ToolResult, ToolSet};
