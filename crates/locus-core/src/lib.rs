//! Locus Core - Types, agent specs, and error handling

pub mod error;
pub mod spec;
pub mod types;
pub mod user_key;

pub use error::{EntityKind, Error, Result};
pub use spec::{AgentSpec, ToolDefinition, ToolKind, ToolsSpec, WILDCARD};
pub use types::*;
pub use user_key::LegacyUserKey;
