//! Workflow suspend/resume checkpoints, stored globally rather than per
//! resource since one execution can outlive the agent that started it.

use crate::layout::{check_id, json_files, read_optional, remove_optional, write_json, StorageLayout};
use chrono::Utc;
use locus_core::{
    EntityKind, Error, ExecutionId, Result, Suspension, SuspensionChange, WorkflowState,
    WorkflowStatePatch, WorkflowStatus,
};
use std::path::PathBuf;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct WorkflowStateStore {
    layout: StorageLayout,
}

impl WorkflowStateStore {
    pub fn new(layout: StorageLayout) -> Self {
        Self { layout }
    }

    fn path(&self, id: &ExecutionId) -> Result<PathBuf> {
        check_id("executionId", id.as_str())?;
        Ok(self.layout.workflow_state_path(id))
    }

    pub async fn get(&self, id: &ExecutionId) -> Result<Option<WorkflowState>> {
        let path = self.path(id)?;
        match read_optional(&path).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| Error::parse(path.display().to_string(), e.to_string())),
        }
    }

    /// Store `state` under `id`. The execution id always comes from `id`, and
    /// an existing entry's `createdAt` is kept.
    /// An unreadable entry is overwritten as if absent.
    pub async fn set(&self, id: &ExecutionId, mut state: WorkflowState) -> Result<WorkflowState> {
        let path = self.path(id)?;
        state.execution_id = id.clone();
        match self.get(id).await {
            Ok(Some(existing)) => state.created_at = existing.created_at,
            Ok(None) => {}
            Err(Error::Parse { location, message }) => {
                warn!("Replacing unreadable workflow state {}: {}", location, message);
            }
            Err(e) => return Err(e),
        }
        state.updated_at = Utc::now();
        write_json(&path, &state).await?;
        Ok(state)
    }

    /// Merge `patch` into the stored entry. Suspension fields missing from the
    /// patch keep their stored values.
    pub async fn update(&self, id: &ExecutionId, patch: WorkflowStatePatch) -> Result<WorkflowState> {
        let mut state = self
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::WorkflowState, id.as_str()))?;

        if let Some(workflow_id) = patch.workflow_id {
            state.workflow_id = workflow_id;
        }
        if let Some(status) = patch.status {
            state.status = status;
        }
        if let Some(result) = patch.result {
            state.result = Some(result);
        }
        if let Some(error) = patch.error {
            state.error = Some(error);
        }

        let now = Utc::now();
        match patch.suspension {
            SuspensionChange::Keep => {}
            SuspensionChange::Clear => state.suspension = None,
            SuspensionChange::Merge(p) => {
                state.suspension = Some(match state.suspension.take() {
                    Some(mut current) => {
                        if let Some(checkpoint) = p.checkpoint {
                            current.checkpoint = checkpoint;
                        }
                        if let Some(at) = p.suspended_at {
                            current.suspended_at = at;
                        }
                        current
                    }
                    None => Suspension {
                        checkpoint: p.checkpoint.unwrap_or(serde_json::Value::Null),
                        suspended_at: p.suspended_at.unwrap_or(now),
                    },
                });
            }
        }
        state.updated_at = now;

        write_json(&self.path(id)?, &state).await?;
        Ok(state)
    }

    pub async fn delete(&self, id: &ExecutionId) -> Result<bool> {
        remove_optional(&self.path(id)?).await
    }

    /// Every readable entry, most recently updated first.
    pub async fn list(&self) -> Result<Vec<WorkflowState>> {
        let mut states = self.scan().await?;
        states.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(states)
    }

    /// Suspended executions of `workflow_id`, oldest suspension first.
    pub async fn get_suspended(&self, workflow_id: &str) -> Result<Vec<WorkflowState>> {
        let mut states: Vec<_> = self
            .scan()
            .await?
            .into_iter()
            .filter(|s| s.status == WorkflowStatus::Suspended && s.workflow_id == workflow_id)
            .collect();
        states.sort_by_key(|s| {
            s.suspension
                .as_ref()
                .map(|x| x.suspended_at)
                .unwrap_or(s.updated_at)
        });
        Ok(states)
    }

    async fn scan(&self) -> Result<Vec<WorkflowState>> {
        let mut out = Vec::new();
        for path in json_files(&self.layout.workflow_states_dir()).await? {
            let bytes = match read_optional(&path).await {
                Ok(Some(b)) => b,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Skipping workflow state {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_slice::<WorkflowState>(&bytes) {
                Ok(state) => out.push(state),
                Err(e) => warn!("Skipping corrupt workflow state {}: {}", path.display(), e),
            }
        }
        Ok(out)
    }
}
