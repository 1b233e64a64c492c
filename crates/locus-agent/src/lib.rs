//! Locus Agent - app configuration, agent spec loading, memory binding,
//! and the agent lifecycle manager

pub mod binding;
pub mod config;
pub mod lifecycle;
pub mod loader;

pub use binding::MemoryBinding;
pub use config::{AgentsConfig, AppConfig, ModelDefaults, StorageConfig};
pub use lifecycle::{AgentContext, AgentLifecycleManager, LifecycleState, StartupSummary};
pub use loader::{ConfigLoader, FsConfigLoader};
