//! Core types for Locus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

macro_rules! define_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(Arc::from(s.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                String::deserialize(deserializer).map(Self::new)
            }
        }
    };
}

define_key!(
    /// Resource identifier - one per configured agent, cheaply cloneable
    ResourceId
);
define_key!(
    /// Conversation identifier, unique across all resources
    ConversationId
);
define_key!(
    /// Workflow execution identifier
    ExecutionId
);

/// Conversation metadata record.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: ConversationId,
    pub resource_id: ResourceId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial conversation update. Identity fields are not representable here.
#[derive(Clone, Debug, Default)]
pub struct ConversationPatch {
    pub title: Option<String>,
    pub user_id: Option<String>,
    /// Replaces the stored metadata wholesale when set.
    pub metadata: Option<Map<String, Value>>,
}

impl ConversationPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Asc,
    #[default]
    Desc,
}

/// Conversation query options. Everything is applied in memory.
#[derive(Clone, Debug, Default)]
pub struct ConversationQuery {
    pub user_id: Option<String>,
    pub resource_id: Option<ResourceId>,
    pub order_by: OrderBy,
    pub direction: Direction,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ConversationQuery {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn for_resource(resource_id: impl Into<ResourceId>) -> Self {
        Self {
            resource_id: Some(resource_id.into()),
            ..Default::default()
        }
    }
}

/// A stored message. Only `role` and `content` are interpreted; every other
/// field is carried through untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content.into())
    }

    /// Content as plain text, if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }
}

/// Which namespace a working-memory note lives in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkingMemoryScope {
    Conversation(ConversationId),
    User(String),
}

impl WorkingMemoryScope {
    pub fn conversation(id: impl Into<ConversationId>) -> Self {
        Self::Conversation(id.into())
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }

    pub fn owner_key(&self) -> &str {
        match self {
            Self::Conversation(id) => id.as_str(),
            Self::User(id) => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct WorkingMemoryRecord {
    pub scope: WorkingMemoryScope,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Running,
    Suspended,
    Completed,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suspension {
    pub checkpoint: Value,
    pub suspended_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub execution_id: ExecutionId,
    pub workflow_id: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suspension: Option<Suspension>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn new(execution_id: impl Into<ExecutionId>, workflow_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            status: WorkflowStatus::Running,
            created_at: now,
            updated_at: now,
            suspension: None,
            result: None,
            error: None,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == WorkflowStatus::Suspended
    }
}

/// Partial suspension update; absent fields keep their stored value.
#[derive(Clone, Debug, Default)]
pub struct SuspensionPatch {
    pub checkpoint: Option<Value>,
    pub suspended_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default)]
pub enum SuspensionChange {
    #[default]
    Keep,
    Clear,
    Merge(SuspensionPatch),
}

#[derive(Clone, Debug, Default)]
pub struct WorkflowStatePatch {
    pub workflow_id: Option<String>,
    pub status: Option<WorkflowStatus>,
    pub suspension: SuspensionChange,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl WorkflowStatePatch {
    pub fn status(status: WorkflowStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
