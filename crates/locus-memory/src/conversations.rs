//! Conversation metadata with id -> owner resolution.
//!
//! There is no central index. A conversation's owner is found by looking in
//! each resource's `conversations/` directory, and the answer is cached for
//! the lifetime of the store. Concurrent create/update of the same id is
//! last-write-wins.

use crate::layout::{check_id, json_files, read_optional, remove_optional, write_json, StorageLayout};
use crate::messages::MessageLog;
use crate::working::WorkingMemoryStore;
use chrono::Utc;
use dashmap::DashMap;
use locus_core::{
    Conversation, ConversationId, ConversationPatch, ConversationQuery, Direction, EntityKind,
    Error, OrderBy, ResourceId, Result, WorkingMemoryScope,
};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub struct ConversationStore {
    layout: StorageLayout,
    owners: DashMap<ConversationId, ResourceId>,
    messages: MessageLog,
    working: WorkingMemoryStore,
}

impl ConversationStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self {
            messages: MessageLog::new(layout.clone()),
            working: WorkingMemoryStore::new(layout.clone()),
            owners: DashMap::new(),
            layout,
        }
    }

    fn record_path(&self, resource: &ResourceId, id: &ConversationId) -> Result<PathBuf> {
        check_id("resourceId", resource.as_str())?;
        check_id("conversationId", id.as_str())?;
        Ok(self.layout.conversation_path(resource, id))
    }

    async fn read_record(
        &self,
        resource: &ResourceId,
        id: &ConversationId,
    ) -> Result<Option<Conversation>> {
        let path = self.record_path(resource, id)?;
        match read_optional(&path).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::parse(path.display().to_string(), e.to_string())),
        }
    }

    async fn write_record(&self, conversation: &Conversation) -> Result<()> {
        let path = self.record_path(&conversation.resource_id, &conversation.id)?;
        write_json(&path, conversation).await?;
        self.owners
            .insert(conversation.id.clone(), conversation.resource_id.clone());
        Ok(())
    }

    /// Create or replace. Replacing keeps the original `createdAt`; an
    /// unreadable record is replaced as if absent. If the id currently lives
    /// under a different resource, its record is removed and its message log
    /// and working memory move along, so the conversation keeps exactly one
    /// owner.
    pub async fn create(
        &self,
        resource: &ResourceId,
        user_id: &str,
        id: &ConversationId,
        title: &str,
        metadata: Map<String, Value>,
    ) -> Result<Conversation> {
        self.record_path(resource, id)?;

        let now = Utc::now();
        let mut created_at = now;
        if let Some(existing) = self.existing_for_replace(resource, id).await? {
            if &existing.resource_id == resource {
                created_at = existing.created_at;
            } else {
                self.relocate(&existing.resource_id, resource, id).await?;
            }
        }

        let conversation = Conversation {
            id: id.clone(),
            resource_id: resource.clone(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            metadata,
            created_at,
            updated_at: now,
        };
        self.write_record(&conversation).await?;
        debug!("Conversation {} written under {}", id, resource);
        Ok(conversation)
    }

    /// Current record for `id` ahead of a replace. Unreadable records are
    /// logged and skipped; those under other resources are removed.
    async fn existing_for_replace(
        &self,
        resource: &ResourceId,
        id: &ConversationId,
    ) -> Result<Option<Conversation>> {
        match self.get(id).await {
            Err(Error::Parse { location, message }) => {
                warn!("Replacing unreadable conversation {}: {}", location, message);
            }
            other => return other,
        }

        self.owners.remove(id);
        let mut found = None;
        for candidate in self.layout.resources().await? {
            match self.read_record(&candidate, id).await {
                Ok(Some(c)) if found.is_none() => found = Some(c),
                Ok(_) => {}
                Err(Error::Parse { .. }) if &candidate != resource => {
                    remove_optional(&self.record_path(&candidate, id)?).await?;
                }
                Err(Error::Parse { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(found)
    }

    /// Drop the record under `from` and carry the log and conversation
    /// working memory over to `to`.
    async fn relocate(&self, from: &ResourceId, to: &ResourceId, id: &ConversationId) -> Result<()> {
        warn!("Conversation {} moves from {} to {}", id, from, to);
        remove_optional(&self.record_path(from, id)?).await?;
        let log = self.messages.relocate(from, to, id).await?;
        let working = self.working.relocate(from, to, id).await?;
        debug!("Moved {} (log: {}, working memory: {})", id, log, working);
        Ok(())
    }

    pub async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        check_id("conversationId", id.as_str())?;
        let cached = self.owners.get(id).map(|r| r.value().clone());
        if let Some(owner) = cached {
            if let Some(conversation) = self.read_record(&owner, id).await? {
                return Ok(Some(conversation));
            }
            self.owners.remove(id);
        }
        self.scan_for(id).await
    }

    async fn scan_for(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        for resource in self.layout.resources().await? {
            if let Some(conversation) = self.read_record(&resource, id).await? {
                self.owners.insert(id.clone(), resource);
                return Ok(Some(conversation));
            }
        }
        Ok(None)
    }

    /// Owning resource of a conversation, using the cache when possible.
    pub async fn resolve_owner(&self, id: &ConversationId) -> Result<Option<ResourceId>> {
        check_id("conversationId", id.as_str())?;
        if let Some(owner) = self.owners.get(id) {
            return Ok(Some(owner.value().clone()));
        }
        Ok(self.scan_for(id).await?.map(|c| c.resource_id))
    }

    /// Owning resource found by scanning, ignoring and refreshing the cache.
    pub async fn resolve_owner_fresh(&self, id: &ConversationId) -> Result<Option<ResourceId>> {
        check_id("conversationId", id.as_str())?;
        self.owners.remove(id);
        Ok(self.scan_for(id).await?.map(|c| c.resource_id))
    }

    pub async fn list(&self, resource: &ResourceId) -> Result<Vec<Conversation>> {
        self.query(&ConversationQuery::for_resource(resource.clone()))
            .await
    }

    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.query(&ConversationQuery::for_user(user_id)).await
    }

    /// Load every matching record, then sort and paginate in memory.
    pub async fn query(&self, query: &ConversationQuery) -> Result<Vec<Conversation>> {
        let resources = match &query.resource_id {
            Some(r) => {
                check_id("resourceId", r.as_str())?;
                vec![r.clone()]
            }
            None => self.layout.resources().await?,
        };

        let mut matches = Vec::new();
        for resource in &resources {
            for path in json_files(&self.layout.conversations_dir(resource)).await? {
                let Some(bytes) = read_optional(&path).await? else {
                    continue;
                };
                let conversation: Conversation = match serde_json::from_slice(&bytes) {
                    Ok(c) => c,
                    Err(e) => {
                        warn!("Skipping unreadable conversation {}: {}", path.display(), e);
                        continue;
                    }
                };
                if let Some(user) = &query.user_id {
                    if &conversation.user_id != user {
                        continue;
                    }
                }
                self.owners
                    .insert(conversation.id.clone(), conversation.resource_id.clone());
                matches.push(conversation);
            }
        }

        matches.sort_by(|a, b| {
            let ord = compare(a, b, query.order_by);
            match query.direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            }
        });

        let page = matches.into_iter().skip(query.offset);
        Ok(match query.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    /// Merge `patch` into the stored record and bump `updatedAt`. Nothing is
    /// written when the conversation does not exist.
    pub async fn update(&self, id: &ConversationId, patch: ConversationPatch) -> Result<Conversation> {
        let mut conversation = self
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Conversation, id.as_str()))?;

        if let Some(title) = patch.title {
            conversation.title = title;
        }
        if let Some(user_id) = patch.user_id {
            conversation.user_id = user_id;
        }
        if let Some(metadata) = patch.metadata {
            conversation.metadata = metadata;
        }
        conversation.updated_at = Utc::now();

        self.write_record(&conversation).await?;
        Ok(conversation)
    }

    /// Bump `updatedAt` only.
    pub async fn touch(&self, id: &ConversationId) -> Result<Conversation> {
        self.update(id, ConversationPatch::default()).await
    }

    /// Remove metadata, message log, and conversation-scoped working memory.
    pub async fn delete(&self, id: &ConversationId) -> Result<()> {
        let owner = self
            .resolve_owner_fresh(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Conversation, id.as_str()))?;

        remove_optional(&self.record_path(&owner, id)?).await?;
        self.messages.remove(&owner, id).await?;
        self.working
            .delete(&owner, &WorkingMemoryScope::Conversation(id.clone()))
            .await?;
        self.owners.remove(id);
        info!("Deleted conversation {} from {}", id, owner);
        Ok(())
    }

    /// Forget every cached owner.
    pub fn clear_cache(&self) {
        self.owners.clear();
    }
}

fn compare(a: &Conversation, b: &Conversation, order_by: OrderBy) -> Ordering {
    let primary = match order_by {
        OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
        OrderBy::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        OrderBy::Title => a.title.cmp(&b.title),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}
