//! Model invocation types

use locus_core::Message;
use serde::{Deserialize, Serialize};

/// Credentials handed to the model client. Resolution order is the
/// client's business; the lifecycle layer only forwards what it was given.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Everything needed to construct a model client for one agent.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelSettings {
    pub model_id: String,
    pub region: String,
    pub credentials: Credentials,
}

/// Tool definition as presented to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LlmTool {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Clone, Debug, Default)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub tools: Vec<LlmTool>,
    pub max_tokens: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Clone, Debug)]
pub struct ModelResponse {
    pub message: Message,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}
