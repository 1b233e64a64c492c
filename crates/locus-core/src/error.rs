//! Error types for Locus

use std::fmt;
use thiserror::Error;

/// What kind of entity a [`Error::NotFound`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Conversation,
    WorkingMemory,
    WorkflowState,
    Agent,
    Tool,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation => write!(f, "conversation"),
            Self::WorkingMemory => write!(f, "working memory"),
            Self::WorkflowState => write!(f, "workflow state"),
            Self::Agent => write!(f, "agent"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("validation failed at {path}: {message}")]
    Validation { path: String, message: String },

    #[error("parse error in {location}: {message}")]
    Parse { location: String, message: String },

    #[error("connection failed for tool {tool}: {message}")]
    Connection { tool: String, message: String },

    #[error("unsupported transport '{transport}' for tool {tool}")]
    UnsupportedTransport { tool: String, transport: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn parse(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn connection(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_transport(tool: impl Into<String>, transport: impl Into<String>) -> Self {
        Self::UnsupportedTransport {
            tool: tool.into(),
            transport: transport.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
