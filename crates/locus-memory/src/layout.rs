//! On-disk layout. Every path the storage engine touches is derived here.
//!
//! ```text
//! <root>/agents/<resourceId>/memory/conversations/<conversationId>.json
//! <root>/agents/<resourceId>/memory/sessions/<conversationId>.ndjson
//! <root>/agents/<resourceId>/memory/working/conversation/<conversationId>.json
//! <root>/agents/<resourceId>/memory/working/user/<sanitizedUserId>.json
//! <root>/agents/<resourceId>/memory/working/<conversationId>.json   (legacy, read/delete only)
//! <root>/workflows/states/<executionId>.json
//! ```

use locus_core::{ConversationId, ExecutionId, ResourceId, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Clone, Debug)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn memory_dir(&self, resource: &ResourceId) -> PathBuf {
        self.agents_dir().join(resource.as_str()).join("memory")
    }

    pub fn conversations_dir(&self, resource: &ResourceId) -> PathBuf {
        self.memory_dir(resource).join("conversations")
    }

    pub fn conversation_path(&self, resource: &ResourceId, id: &ConversationId) -> PathBuf {
        self.conversations_dir(resource).join(format!("{}.json", id))
    }

    pub fn session_log_path(&self, resource: &ResourceId, id: &ConversationId) -> PathBuf {
        self.memory_dir(resource)
            .join("sessions")
            .join(format!("{}.ndjson", id))
    }

    pub fn working_dir(&self, resource: &ResourceId) -> PathBuf {
        self.memory_dir(resource).join("working")
    }

    pub fn conversation_working_path(&self, resource: &ResourceId, id: &ConversationId) -> PathBuf {
        self.working_dir(resource)
            .join("conversation")
            .join(format!("{}.json", id))
    }

    pub fn user_working_path(&self, resource: &ResourceId, user_id: &str) -> PathBuf {
        self.working_dir(resource)
            .join("user")
            .join(format!("{}.json", sanitize_user_id(user_id)))
    }

    /// Flat file written before working memory was split by scope.
    pub fn legacy_working_path(&self, resource: &ResourceId, id: &ConversationId) -> PathBuf {
        self.working_dir(resource).join(format!("{}.json", id))
    }

    pub fn workflow_states_dir(&self) -> PathBuf {
        self.root.join("workflows").join("states")
    }

    pub fn workflow_state_path(&self, id: &ExecutionId) -> PathBuf {
        self.workflow_states_dir().join(format!("{}.json", id))
    }

    /// Every resource that has a directory under `agents/`, sorted.
    pub async fn resources(&self) -> Result<Vec<ResourceId>> {
        let mut entries = match fs::read_dir(self.agents_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                out.push(ResourceId::new(entry.file_name().to_string_lossy().into_owned()));
            }
        }
        out.sort();
        Ok(out)
    }
}

/// Map a user id onto a safe file stem: ASCII alphanumerics, `-` and `_`
/// pass through, everything else becomes `_`.
pub fn sanitize_user_id(user_id: &str) -> String {
    user_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Identifiers become file and directory names verbatim, so they must not
/// be able to walk out of their directory.
pub(crate) fn check_id(field: &str, id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." || id.contains(['/', '\\', '\0']) {
        return Err(locus_core::Error::validation(
            field,
            format!("'{}' is not usable as a storage key", id),
        ));
    }
    Ok(())
}

/// Read a file, mapping a missing file to `None`.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Serialize and write a record in one call, creating parent directories.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).await?;
    Ok(())
}

/// Remove a file, returning whether it existed.
pub(crate) async fn remove_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Rename `from` to `to`, creating the target's parent directories. A
/// missing source is not an error; returns whether anything moved.
pub(crate) async fn move_optional(from: &Path, to: &Path) -> Result<bool> {
    if !fs::try_exists(from).await? {
        return Ok(false);
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    match fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// `*.json` files directly inside `dir`; a missing directory is empty.
pub(crate) async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_stable() {
        let layout = StorageLayout::new("/data");
        let res = ResourceId::new("agent-a");
        let conv = ConversationId::new("c1");
        assert_eq!(
            layout.conversation_path(&res, &conv),
            PathBuf::from("/data/agents/agent-a/memory/conversations/c1.json")
        );
        assert_eq!(
            layout.session_log_path(&res, &conv),
            PathBuf::from("/data/agents/agent-a/memory/sessions/c1.ndjson")
        );
        assert_eq!(
            layout.conversation_working_path(&res, &conv),
            PathBuf::from("/data/agents/agent-a/memory/working/conversation/c1.json")
        );
        assert_eq!(
            layout.user_working_path(&res, "u1"),
            PathBuf::from("/data/agents/agent-a/memory/working/user/u1.json")
        );
        assert_eq!(
            layout.legacy_working_path(&res, &conv),
            PathBuf::from("/data/agents/agent-a/memory/working/c1.json")
        );
        assert_eq!(
            layout.workflow_state_path(&ExecutionId::new("run-9")),
            PathBuf::from("/data/workflows/states/run-9.json")
        );
    }

    #[test]
    fn sanitize_replaces_path_characters() {
        assert_eq!(sanitize_user_id("alice"), "alice");
        assert_eq!(sanitize_user_id("a.b@c/d"), "a_b_c_d");
        assert_eq!(sanitize_user_id("../etc"), "___etc");
        assert_eq!(sanitize_user_id("user_1-x"), "user_1-x");
    }
}
