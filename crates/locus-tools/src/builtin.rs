//! In-process tools built from a policy document. No builtins ship with
//! the crate; hosts register factories by tool id.

use crate::registry::Tool;
use locus_core::{EntityKind, Error, Result, ToolDefinition};
use std::collections::HashMap;
use std::sync::Arc;

pub trait BuiltinToolFactory: Send + Sync {
    fn build(&self, definition: &ToolDefinition) -> Result<Vec<Arc<dyn Tool>>>;
}

impl<F> BuiltinToolFactory for F
where
    F: Fn(&ToolDefinition) -> Result<Vec<Arc<dyn Tool>>> + Send + Sync,
{
    fn build(&self, definition: &ToolDefinition) -> Result<Vec<Arc<dyn Tool>>> {
        self(definition)
    }
}

#[derive(Default, Clone)]
pub struct BuiltinCatalog {
    factories: HashMap<String, Arc<dyn BuiltinToolFactory>>,
}

impl BuiltinCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn register(&mut self, tool_id: impl Into<String>, factory: impl BuiltinToolFactory + 'static) {
        self.factories.insert(tool_id.into(), Arc::new(factory));
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.factories.contains_key(tool_id)
    }

    pub fn build(&self, definition: &ToolDefinition) -> Result<Vec<Arc<dyn Tool>>> {
        let factory = self
            .factories
            .get(&definition.id)
            .ok_or_else(|| Error::not_found(EntityKind::Tool, definition.id.as_str()))?;
        factory.build(definition)
    }
}
