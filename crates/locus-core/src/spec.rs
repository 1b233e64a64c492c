//! Agent and tool declarations as handed over by the config loader.
//!
//! Only structural checks live here. Anything deeper (JSON schema, policy
//! semantics) belongs to whoever produces the documents.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Allow-list entry that keeps every resolved tool.
pub const WILDCARD: &str = "*";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentSpec {
    pub name: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guardrails: Option<Value>,
    #[serde(default)]
    pub tools: ToolsSpec,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolsSpec {
    #[serde(rename = "use", default)]
    pub uses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    /// original tool name -> name exposed to the agent
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aliases: BTreeMap<String, String>,
}

impl ToolsSpec {
    /// True when no filtering applies.
    pub fn allows_everything(&self) -> bool {
        match &self.allowed {
            None => true,
            Some(list) => list.iter().any(|e| e == WILDCARD),
        }
    }
}

impl AgentSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        if self.prompt.trim().is_empty() {
            return Err(Error::validation("prompt", "must not be empty"));
        }
        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                return Err(Error::validation("model", "must not be empty when set"));
            }
        }

        let mut seen = HashSet::new();
        for (i, id) in self.tools.uses.iter().enumerate() {
            if id.trim().is_empty() {
                return Err(Error::validation(format!("tools.use[{}]", i), "must not be empty"));
            }
            if !seen.insert(id.as_str()) {
                return Err(Error::validation(
                    format!("tools.use[{}]", i),
                    format!("duplicate tool id '{}'", id),
                ));
            }
        }
        if let Some(allowed) = &self.tools.allowed {
            for (i, entry) in allowed.iter().enumerate() {
                if entry.trim().is_empty() {
                    return Err(Error::validation(format!("tools.allowed[{}]", i), "must not be empty"));
                }
            }
        }
        for (from, to) in &self.tools.aliases {
            if to.trim().is_empty() {
                return Err(Error::validation(format!("tools.aliases.{}", from), "must not be empty"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Mcp,
    Builtin,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub id: String,
    pub kind: ToolKind,
    /// `stdio`, `http`, `sse`. Kept as free text so an unknown transport
    /// surfaces at load time rather than as a parse failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub permissions: Map<String, Value>,
    /// Policy document for builtin tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}

impl ToolDefinition {
    pub fn mcp_stdio(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ToolKind::Mcp,
            transport: Some("stdio".into()),
            command: Some(command.into()),
            args: Vec::new(),
            endpoint: None,
            env: BTreeMap::new(),
            permissions: Map::new(),
            policy: None,
        }
    }

    pub fn builtin(id: impl Into<String>, policy: Option<Value>) -> Self {
        Self {
            id: id.into(),
            kind: ToolKind::Builtin,
            transport: None,
            command: None,
            args: Vec::new(),
            endpoint: None,
            env: BTreeMap::new(),
            permissions: Map::new(),
            policy,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::validation("id", "must not be empty"));
        }
        if self.kind != ToolKind::Mcp {
            return Ok(());
        }
        match self.transport.as_deref() {
            None => Err(Error::validation("transport", "required for mcp tools")),
            Some("stdio") if self.command.as_deref().map_or(true, |c| c.trim().is_empty()) => {
                Err(Error::validation("command", "required for stdio transport"))
            }
            Some("http") | Some("sse")
                if self.endpoint.as_deref().map_or(true, |e| e.trim().is_empty()) =>
            {
                Err(Error::validation("endpoint", "required for http/sse transport"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> AgentSpec {
        AgentSpec {
            name: "Writer".into(),
            prompt: "You write.".into(),
            model: None,
            region: None,
            guardrails: None,
            tools: ToolsSpec::default(),
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(spec().validate().is_ok());
    }

    #[test]
    fn duplicate_tool_reports_index() {
        let mut s = spec();
        s.tools.uses = vec!["files".into(), "files".into()];
        match s.validate() {
            Err(Error::Validation { path, .. }) => assert_eq!(path, "tools.use[1]"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn wildcard_detection() {
        let mut t = ToolsSpec::default();
        assert!(t.allows_everything());
        t.allowed = Some(vec!["read".into()]);
        assert!(!t.allows_everything());
        t.allowed = Some(vec!["read".into(), "*".into()]);
        assert!(t.allows_everything());
    }

    #[test]
    fn stdio_without_command_is_rejected() {
        let mut def = ToolDefinition::mcp_stdio("files", "mcp-files");
        def.command = None;
        match def.validate() {
            Err(Error::Validation { path, .. }) => assert_eq!(path, "command"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_transport_is_not_a_validation_error() {
        let mut def = ToolDefinition::mcp_stdio("files", "mcp-files");
        def.transport = Some("carrier-pigeon".into());
        assert!(def.validate().is_ok());
    }
}
