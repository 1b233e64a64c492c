//! Resolves an agent's declared tool ids into a [`ToolSet`].
//!
//! Remote connections are cached per `(agent slug, tool id)` and live until
//! [`ToolLoader::release`] is called for the agent. Rebuilding an agent
//! therefore reuses its connections instead of spawning new servers.
//! Loads for the same slug must not run concurrently; the lifecycle manager
//! serializes them.

use crate::builtin::BuiltinCatalog;
use crate::mcp::{McpConnection, McpConnector};
use crate::registry::{AliasedTool, Tool, ToolSet};
use dashmap::DashMap;
use futures::future::join_all;
use locus_core::{Error, Result, ToolDefinition, ToolKind, ToolsSpec, WILDCARD};
use std::sync::Arc;
use tracing::{debug, info, warn};

type CacheKey = (String, String);

/// Outcome of resolving one agent's tools. Per-tool failures never fail
/// the whole load.
pub struct LoadedTools {
    pub tools: ToolSet,
    pub failures: Vec<(String, Error)>,
    /// Allow-list entries that matched no resolved tool.
    pub unmatched_allow_entries: Vec<String>,
}

pub struct ToolLoader {
    connector: Arc<dyn McpConnector>,
    builtins: BuiltinCatalog,
    connections: DashMap<CacheKey, Arc<McpConnection>>,
}

impl ToolLoader {
    pub fn new(connector: Arc<dyn McpConnector>, builtins: BuiltinCatalog) -> Self {
        Self {
            connector,
            builtins,
            connections: DashMap::new(),
        }
    }

    /// Resolve every id in `spec.uses`, looking definitions up with `resolve`,
    /// then apply aliases and the allow-list.
    pub async fn load<F>(&self, agent_slug: &str, spec: &ToolsSpec, resolve: F) -> LoadedTools
    where
        F: Fn(&str) -> Result<ToolDefinition>,
    {
        let mut resolved: Vec<Arc<dyn Tool>> = Vec::new();
        let mut failures = Vec::new();

        for tool_id in &spec.uses {
            match self.resolve_one(agent_slug, tool_id, &resolve).await {
                Ok(mut tools) => resolved.append(&mut tools),
                Err(e) => {
                    warn!("Agent {}: tool '{}' unavailable: {}", agent_slug, tool_id, e);
                    failures.push((tool_id.clone(), e));
                }
            }
        }

        let (tools, unmatched_allow_entries) = filter_tools(resolved, spec);
        for entry in &unmatched_allow_entries {
            debug!("Agent {}: allow-list entry '{}' matched no tool", agent_slug, entry);
        }

        LoadedTools {
            tools,
            failures,
            unmatched_allow_entries,
        }
    }

    async fn resolve_one<F>(&self, agent_slug: &str, tool_id: &str, resolve: &F) -> Result<Vec<Arc<dyn Tool>>>
    where
        F: Fn(&str) -> Result<ToolDefinition>,
    {
        let definition = resolve(tool_id)?;
        definition.validate()?;
        match definition.kind {
            ToolKind::Mcp => Ok(self.connection(agent_slug, &definition).await?.as_tools()),
            ToolKind::Builtin => self.builtins.build(&definition),
        }
    }

    /// Cached connection for `(agent_slug, definition.id)`, connecting and
    /// discovering on a miss.
    async fn connection(&self, agent_slug: &str, definition: &ToolDefinition) -> Result<Arc<McpConnection>> {
        let key = (agent_slug.to_string(), definition.id.clone());
        if let Some(existing) = self.connections.get(&key).map(|e| e.value().clone()) {
            debug!("Agent {}: reusing connection for '{}'", agent_slug, definition.id);
            return Ok(existing);
        }

        let client = self.connector.client_for(definition)?;
        client
            .connect()
            .await
            .map_err(|e| as_connection_error(&definition.id, e))?;

        let tools = match client.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                if let Err(de) = client.disconnect().await {
                    warn!("Disconnect after failed discovery of '{}': {}", definition.id, de);
                }
                return Err(as_connection_error(&definition.id, e));
            }
        };

        info!(
            "Agent {}: connected '{}' ({} tools)",
            agent_slug,
            definition.id,
            tools.len()
        );
        let connection = Arc::new(McpConnection {
            tool_id: definition.id.clone(),
            client,
            tools,
        });
        self.connections.insert(key, connection.clone());
        Ok(connection)
    }

    /// Disconnect and forget every connection owned by `agent_slug`. A failed
    /// disconnect is logged and does not stop the others. Returns how many
    /// connections were released.
    pub async fn release(&self, agent_slug: &str) -> usize {
        let keys: Vec<CacheKey> = self
            .connections
            .iter()
            .filter(|e| e.key().0 == agent_slug)
            .map(|e| e.key().clone())
            .collect();

        let owned: Vec<Arc<McpConnection>> = keys
            .iter()
            .filter_map(|k| self.connections.remove(k).map(|(_, c)| c))
            .collect();

        let results = join_all(owned.iter().map(|c| c.client.disconnect())).await;
        for (connection, result) in owned.iter().zip(results) {
            if let Err(e) = result {
                warn!(
                    "Agent {}: disconnect of '{}' failed: {}",
                    agent_slug, connection.tool_id, e
                );
            }
        }
        owned.len()
    }

    pub async fn release_all(&self) -> usize {
        let mut slugs: Vec<String> = self.connections.iter().map(|e| e.key().0.clone()).collect();
        slugs.sort();
        slugs.dedup();

        let mut released = 0;
        for slug in slugs {
            released += self.release(&slug).await;
        }
        released
    }

    pub fn connection_count(&self, agent_slug: &str) -> usize {
        self.connections
            .iter()
            .filter(|e| e.key().0 == agent_slug)
            .count()
    }
}

fn as_connection_error(tool_id: &str, e: Error) -> Error {
    match e {
        Error::Connection { .. } => e,
        other => Error::connection(tool_id, other.to_string()),
    }
}

/// Apply aliases, then the allow-list. An entry matches a tool by its
/// exposed name or its original name.
fn filter_tools(resolved: Vec<Arc<dyn Tool>>, spec: &ToolsSpec) -> (ToolSet, Vec<String>) {
    let keep_all = spec.allows_everything();
    let allowed: &[String] = spec.allowed.as_deref().unwrap_or(&[]);
    let mut matched = vec![false; allowed.len()];
    let mut set = ToolSet::new();

    for tool in resolved {
        let original = tool.name().to_string();
        let exposed = spec
            .aliases
            .get(&original)
            .cloned()
            .unwrap_or_else(|| original.clone());

        let mut keep = keep_all;
        for (i, entry) in allowed.iter().enumerate() {
            if entry == &exposed || entry == &original {
                matched[i] = true;
                keep = true;
            }
        }
        if !keep {
            continue;
        }

        if exposed == original {
            set.register(tool);
        } else {
            set.register(Arc::new(AliasedTool::new(exposed, tool)));
        }
    }

    let unmatched = allowed
        .iter()
        .zip(matched)
        .filter(|(entry, hit)| !hit && entry.as_str() != WILDCARD)
        .map(|(entry, _)| entry.clone())
        .collect();
    (set, unmatched)
}
