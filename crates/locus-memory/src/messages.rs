//! Append-only message history, one NDJSON file per conversation.

use crate::layout::{check_id, move_optional, remove_optional, StorageLayout};
use locus_core::{ConversationId, Message, ResourceId, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

#[derive(Clone, Debug)]
pub struct MessageLog {
    layout: StorageLayout,
}

impl MessageLog {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    fn log_path(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<PathBuf> {
        check_id("resourceId", resource.as_str())?;
        check_id("conversationId", conversation.as_str())?;
        Ok(self.layout.session_log_path(resource, conversation))
    }

    pub async fn append(
        &self,
        resource: &ResourceId,
        conversation: &ConversationId,
        message: &Message,
    ) -> Result<()> {
        self.append_batch(resource, conversation, std::slice::from_ref(message))
            .await
            .map(|_| ())
    }

    /// Append every message in a single write. Returns the number written.
    pub async fn append_batch(
        &self,
        resource: &ResourceId,
        conversation: &ConversationId,
        messages: &[Message],
    ) -> Result<usize> {
        let path = self.log_path(resource, conversation)?;
        if messages.is_empty() {
            return Ok(0);
        }

        let mut buf = Vec::new();
        for message in messages {
            serde_json::to_writer(&mut buf, message)?;
            buf.push(b'\n');
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;
        Ok(messages.len())
    }

    /// Read the log in append order. With `limit`, the whole file is still
    /// read and only the last `limit` entries are kept. Malformed lines are
    /// skipped; a missing log reads as empty.
    pub async fn read(
        &self,
        resource: &ResourceId,
        conversation: &ConversationId,
        limit: Option<usize>,
    ) -> Result<Vec<Message>> {
        let path = self.log_path(resource, conversation)?;
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut messages = Vec::new();
        let mut line_no = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(trimmed) {
                Ok(m) => messages.push(m),
                Err(e) => warn!(
                    "Skipping malformed message at {}:{}: {}",
                    path.display(),
                    line_no,
                    e
                ),
            }
        }

        if let Some(k) = limit {
            if messages.len() > k {
                messages = messages.split_off(messages.len() - k);
            }
        }
        Ok(messages)
    }

    pub async fn count(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<usize> {
        Ok(self.read(resource, conversation, None).await?.len())
    }

    pub async fn exists(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<bool> {
        let path = self.log_path(resource, conversation)?;
        Ok(fs::try_exists(path).await?)
    }

    /// Truncate the log to zero bytes. The file is left in place.
    pub async fn clear(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<()> {
        let path = self.log_path(resource, conversation)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.sync_all().await?;
        Ok(())
    }

    /// Delete the log file entirely. Only used when the conversation goes.
    pub async fn remove(&self, resource: &ResourceId, conversation: &ConversationId) -> Result<bool> {
        remove_optional(&self.log_path(resource, conversation)?).await
    }

    /// Move the log to another resource, replacing any log already there.
    /// Returns false when there was nothing to move.
    pub(crate) async fn relocate(
        &self,
        from: &ResourceId,
        to: &ResourceId,
        conversation: &ConversationId,
    ) -> Result<bool> {
        let source = self.log_path(from, conversation)?;
        let target = self.log_path(to, conversation)?;
        move_optional(&source, &target).await
    }
}
