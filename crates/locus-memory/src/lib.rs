//! Locus Memory - file-backed storage for conversations, messages,
//! working memory, and workflow checkpoints

pub mod conversations;
pub mod layout;
pub mod messages;
pub mod store;
pub mod working;
pub mod workflow;

pub use conversations::ConversationStore;
pub use layout::{sanitize_user_id, StorageLayout};
pub use messages::MessageLog;
pub use store::{MemoryStore, DEFAULT_TITLE};
pub use working::WorkingMemoryStore;
pub use workflow::WorkflowStateStore;
