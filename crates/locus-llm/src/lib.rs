//! Locus LLM - model invocation contract consumed by the lifecycle manager

pub mod client;
pub mod types;

pub use client::{LlmError, LlmResult, ModelClient, ModelClientFactory};
pub use types::*;
