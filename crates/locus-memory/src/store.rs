//! One handle over every store, wiring the cross-store write path:
//! append to the log, then touch the conversation.

use crate::conversations::ConversationStore;
use crate::layout::StorageLayout;
use crate::messages::MessageLog;
use crate::working::WorkingMemoryStore;
use crate::workflow::WorkflowStateStore;
use locus_core::{ConversationId, EntityKind, Error, Message, ResourceId, Result};
use serde_json::Map;
use std::path::Path;
use tracing::debug;

/// Title given to conversations created implicitly by their first message.
pub const DEFAULT_TITLE: &str = "New conversation";

pub struct MemoryStore {
    layout: StorageLayout,
    conversations: ConversationStore,
    messages: MessageLog,
    working: WorkingMemoryStore,
    workflows: WorkflowStateStore,
}

impl MemoryStore {
    pub fn open(root: impl AsRef<Path>) -> Self {
        let layout = StorageLayout::new(root);
        Self {
            conversations: ConversationStore::new(layout.clone()),
            messages: MessageLog::new(layout.clone()),
            working: WorkingMemoryStore::new(layout.clone()),
            workflows: WorkflowStateStore::new(layout.clone()),
            layout,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }
    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }
    pub fn working(&self) -> &WorkingMemoryStore {
        &self.working
    }
    pub fn workflows(&self) -> &WorkflowStateStore {
        &self.workflows
    }

    /// Append to the conversation's log, then bump its `updatedAt`. A
    /// conversation that does not exist yet is created with an empty user
    /// id. The two steps are not transactional. Appending under a resource
    /// other than the owner is a validation error and writes nothing.
    pub async fn append_messages(
        &self,
        resource: &ResourceId,
        conversation: &ConversationId,
        messages: &[Message],
    ) -> Result<usize> {
        self.check_owner(resource, conversation).await?;
        let written = self
            .messages
            .append_batch(resource, conversation, messages)
            .await?;
        if written == 0 {
            return Ok(0);
        }

        match self.conversations.touch(conversation).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                debug!("First message for {} creates the conversation", conversation);
                self.conversations
                    .create(resource, "", conversation, DEFAULT_TITLE, Map::new())
                    .await?;
            }
            Err(e) => return Err(e),
        }
        Ok(written)
    }

    /// Append by conversation id alone. The conversation must exist.
    pub async fn append_by_id(&self, conversation: &ConversationId, messages: &[Message]) -> Result<usize> {
        let owner = self.owner_with_log(conversation).await?;
        self.append_messages(&owner, conversation, messages).await
    }

    /// Read by conversation id alone.
    pub async fn read_messages(
        &self,
        conversation: &ConversationId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let owner = self.owner_with_log(conversation).await?;
        self.messages.read(&owner, conversation, limit).await
    }

    pub async fn clear_messages(&self, conversation: &ConversationId) -> Result<()> {
        let owner = self.owner_with_log(conversation).await?;
        self.messages.clear(&owner, conversation).await
    }

    pub async fn delete_conversation(&self, conversation: &ConversationId) -> Result<()> {
        self.conversations.delete(conversation).await
    }

    async fn check_owner(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<()> {
        let Some(cached) = self.conversations.resolve_owner(conversation).await? else {
            return Ok(());
        };
        if &cached == resource {
            return Ok(());
        }
        match self.conversations.resolve_owner_fresh(conversation).await? {
            Some(owner) if &owner != resource => Err(Error::validation(
                "resourceId",
                format!("conversation {} belongs to {}, not {}", conversation, owner, resource),
            )),
            _ => Ok(()),
        }
    }

    /// Owner whose log path should be used. When the cached owner has no log
    /// file, ownership is re-resolved from disk before accepting that the
    /// conversation simply has no history yet.
    async fn owner_with_log(&self, conversation: &ConversationId) -> Result<ResourceId> {
        let owner = self
            .conversations
            .resolve_owner(conversation)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Conversation, conversation.as_str()))?;
        if self.messages.exists(&owner, conversation).await? {
            return Ok(owner);
        }

        match self.conversations.resolve_owner_fresh(conversation).await? {
            Some(fresh) => {
                if fresh != owner {
                    debug!("Conversation {} re-resolved from {} to {}", conversation, owner, fresh);
                }
                Ok(fresh)
            }
            None => Err(Error::not_found(EntityKind::Conversation, conversation.as_str())),
        }
    }
}
