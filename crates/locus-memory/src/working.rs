//! Working memory: small free-text notes scoped to a conversation or a user.

use crate::layout::{check_id, move_optional, read_optional, remove_optional, write_json, StorageLayout};
use chrono::{DateTime, Utc};
use locus_core::{ConversationId, ResourceId, Result, WorkingMemoryRecord, WorkingMemoryScope};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkingMemoryFile {
    content: String,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct WorkingMemoryStore {
    layout: StorageLayout,
}

impl WorkingMemoryStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    fn path(&self, resource: &ResourceId, scope: &WorkingMemoryScope) -> Result<PathBuf> {
        check_id("resourceId", resource.as_str())?;
        Ok(match scope {
            WorkingMemoryScope::Conversation(id) => {
                check_id("conversationId", id.as_str())?;
                self.layout.conversation_working_path(resource, id)
            }
            WorkingMemoryScope::User(user) => self.layout.user_working_path(resource, user),
        })
    }

    pub async fn get(
        &self,
        resource: &ResourceId,
        scope: &WorkingMemoryScope,
    ) -> Result<Option<WorkingMemoryRecord>> {
        let path = self.path(resource, scope)?;
        if let Some(bytes) = read_optional(&path).await? {
            let file: WorkingMemoryFile = serde_json::from_slice(&bytes)
                .map_err(|e| locus_core::Error::parse(path.display().to_string(), e.to_string()))?;
            return Ok(Some(WorkingMemoryRecord {
                scope: scope.clone(),
                content: file.content,
                updated_at: file.updated_at,
            }));
        }

        match scope {
            WorkingMemoryScope::Conversation(id) => self.get_legacy(resource, id).await,
            WorkingMemoryScope::User(_) => Ok(None),
        }
    }

    /// The flat pre-scope layout. Files there hold either the JSON record
    /// or the raw note text.
    async fn get_legacy(
        &self,
        resource: &ResourceId,
        id: &ConversationId,
    ) -> Result<Option<WorkingMemoryRecord>> {
        let path = self.layout.legacy_working_path(resource, id);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(None);
        };
        debug!("Working memory for {} served from legacy path {}", id, path.display());

        let scope = WorkingMemoryScope::Conversation(id.clone());
        if let Ok(file) = serde_json::from_slice::<WorkingMemoryFile>(&bytes) {
            return Ok(Some(WorkingMemoryRecord {
                scope,
                content: file.content,
                updated_at: file.updated_at,
            }));
        }

        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => {
                warn!("Ignoring unreadable legacy working memory {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        let updated_at = fs::metadata(&path)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        Ok(Some(WorkingMemoryRecord {
            scope,
            content,
            updated_at,
        }))
    }

    pub async fn set(
        &self,
        resource: &ResourceId,
        scope: &WorkingMemoryScope,
        content: impl Into<String>,
    ) -> Result<WorkingMemoryRecord> {
        let path = self.path(resource, scope)?;
        let file = WorkingMemoryFile {
            content: content.into(),
            updated_at: Utc::now(),
        };
        write_json(&path, &file).await?;
        Ok(WorkingMemoryRecord {
            scope: scope.clone(),
            content: file.content,
            updated_at: file.updated_at,
        })
    }

    /// Remove the note. For conversation scope the legacy file goes too.
    /// Returns whether anything was removed.
    pub async fn delete(&self, resource: &ResourceId, scope: &WorkingMemoryScope) -> Result<bool> {
        let mut removed = remove_optional(&self.path(resource, scope)?).await?;
        if let WorkingMemoryScope::Conversation(id) = scope {
            removed |= remove_optional(&self.layout.legacy_working_path(resource, id)).await?;
        }
        Ok(removed)
    }

    /// Move a conversation's note, and its legacy file if any, to another
    /// resource.
    pub(crate) async fn relocate(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        id: &ConversationId,
    ) -> Result<bool> {
        let scope = WorkingMemoryScope::Conversation(id.clone());
        let mut moved = move_optional(&self.path(from, &scope)?, &self.path(to, &scope)?).await?;
        moved |= move_optional(
            &self.layout.legacy_working_path(from, id),
            &self.layout.legacy_working_path(to, id),
        )
        .await?;
        Ok(moved)
    }
}
