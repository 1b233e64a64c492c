//! Resource-scoped view over the memory store, handed to each agent
//! runtime so it never has to pass its own resource id around.

use locus_core::{
    Conversation, ConversationId, ConversationQuery, LegacyUserKey, Message, ResourceId, Result,
    WorkingMemoryRecord, WorkingMemoryScope,
};
use locus_memory::{MemoryStore, DEFAULT_TITLE};
use serde_json::Map;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct MemoryBinding {
    resource_id: ResourceId,
    store: Arc<MemoryStore>,
}

impl MemoryBinding {
    pub fn new(resource_id: ResourceId, store: Arc<MemoryStore>) -> Self {
        Self { resource_id, store }
    }

    pub fn resource_id(&self) -> &ResourceId {
        &self.resource_id
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Plain user id for `raw`. Encoded `agent:<slug>:user:<id>` keys are
    /// unwrapped; a key naming another agent is kept whole.
    pub fn user_id(&self, raw: &str) -> String {
        match LegacyUserKey::parse(raw) {
            Some(key) if key.resource_id == self.resource_id => key.user_id,
            Some(key) => {
                warn!(
                    "User key {} names agent {} but is used by {}",
                    raw, key.resource_id, self.resource_id
                );
                raw.to_string()
            }
            None => raw.to_string(),
        }
    }

    /// Encoded form of a user id, for callers still keyed on it.
    pub fn legacy_user_key(&self, user_id: &str) -> LegacyUserKey {
        LegacyUserKey::new(self.resource_id.clone(), self.user_id(user_id))
    }

    /// New conversation under this resource. A fresh id is generated when
    /// none is given.
    pub async fn create_conversation(
        &self,
        user_id: &str,
        id: Option<ConversationId>,
        title: Option<&str>,
    ) -> Result<Conversation> {
        let id = id.unwrap_or_else(|| ConversationId::new(uuid::Uuid::new_v4().to_string()));
        self.store
            .conversations()
            .create(
                &self.resource_id,
                &self.user_id(user_id),
                &id,
                title.unwrap_or(DEFAULT_TITLE),
                Map::new(),
            )
            .await
    }

    /// The conversation, if it exists and belongs to this resource.
    pub async fn conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        Ok(self
            .store
            .conversations()
            .get(id)
            .await?
            .filter(|c| c.resource_id == self.resource_id))
    }

    /// This resource's conversations for one user, most recently updated first.
    pub async fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let query = ConversationQuery {
            user_id: Some(self.user_id(user_id)),
            resource_id: Some(self.resource_id.clone()),
            ..Default::default()
        };
        self.store.conversations().query(&query).await
    }

    pub async fn append(&self, conversation: &ConversationId, messages: &[Message]) -> Result<usize> {
        self.store
            .append_messages(&self.resource_id, conversation, messages)
            .await
    }

    pub async fn history(&self, conversation: &ConversationId, limit: Option<usize>) -> Result<Vec<Message>> {
        self.store
            .messages()
            .read(&self.resource_id, conversation, limit)
            .await
    }

    pub async fn working_memory(&self, scope: &WorkingMemoryScope) -> Result<Option<WorkingMemoryRecord>> {
        let scope = self.normalize(scope);
        self.store.working().get(&self.resource_id, &scope).await
    }

    pub async fn set_working_memory(
        &self,
        scope: &WorkingMemoryScope,
        content: impl Into<String>,
    ) -> Result<WorkingMemoryRecord> {
        let scope = self.normalize(scope);
        self.store
            .working()
            .set(&self.resource_id, &scope, content)
            .await
    }

    fn normalize(&self, scope: &WorkingMemoryScope) -> WorkingMemoryScope {
        match scope {
            WorkingMemoryScope::User(raw) => WorkingMemoryScope::User(self.user_id(raw)),
            other => other.clone(),
        }
    }
}
