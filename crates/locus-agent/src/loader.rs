//! Where agent specs and tool definitions come from.

use locus_core::{AgentSpec, EntityKind, Error, Result, ToolDefinition};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait ConfigLoader: Send + Sync {
    /// Every configured agent, sorted.
    fn agent_slugs(&self) -> Result<Vec<String>>;

    /// Parsed and validated spec for `slug`.
    fn load_agent(&self, slug: &str) -> Result<AgentSpec>;

    fn tool_definition(&self, tool_id: &str) -> Result<ToolDefinition>;
}

/// Reads `<dir>/agents/<slug>.toml` and `<dir>/tools/<id>.toml`.
#[derive(Clone, Debug)]
pub struct FsConfigLoader {
    dir: PathBuf,
}

impl FsConfigLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn agents_dir(&self) -> PathBuf {
        self.dir.join("agents")
    }

    fn tools_dir(&self) -> PathBuf {
        self.dir.join("tools")
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path, kind: EntityKind, id: &str) -> Result<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(Error::not_found(kind, id)),
        Err(e) => return Err(e.into()),
    };
    debug!("Reading {} {} from {}", kind, id, path.display());
    toml::from_str(&content).map_err(|e| Error::parse(path.display().to_string(), e.message()))
}

impl ConfigLoader for FsConfigLoader {
    fn agent_slugs(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(self.agents_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut slugs = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                slugs.push(stem.to_string());
            }
        }
        slugs.sort();
        Ok(slugs)
    }

    fn load_agent(&self, slug: &str) -> Result<AgentSpec> {
        if slug.is_empty() || slug.contains(['/', '\\']) || slug == ".." {
            return Err(Error::validation("slug", format!("invalid agent slug '{}'", slug)));
        }
        let path = self.agents_dir().join(format!("{}.toml", slug));
        let spec: AgentSpec = read_toml(&path, EntityKind::Agent, slug)?;
        spec.validate()?;
        Ok(spec)
    }

    fn tool_definition(&self, tool_id: &str) -> Result<ToolDefinition> {
        if tool_id.is_empty() || tool_id.contains(['/', '\\']) || tool_id == ".." {
            return Err(Error::not_found(EntityKind::Tool, tool_id));
        }
        let path = self.tools_dir().join(format!("{}.toml", tool_id));
        let definition: ToolDefinition = read_toml(&path, EntityKind::Tool, tool_id)?;
        if definition.id != tool_id {
            return Err(Error::validation(
                "id",
                format!("'{}' does not match file name '{}'", definition.id, tool_id),
            ));
        }
        Ok(definition)
    }
}
