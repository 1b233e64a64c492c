//! Agent lifecycle - builds, switches, and tears down agent runtimes.
//!
//! Each slug moves through `Idle -> Waiting -> Build -> Teardown -> Ready`.
//! The previous context stays live until its replacement is assembled, so a
//! failed rebuild leaves the agent `Failed` but still usable. A per-slug
//! async mutex keeps at most one transition in flight per slug; different
//! slugs build concurrently. Any number of agents may be active.
//!
//! Config loading is synchronous and runs on the blocking pool.

use crate::binding::MemoryBinding;
use crate::config::{AppConfig, ModelDefaults};
use crate::loader::ConfigLoader;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use locus_core::{AgentSpec, Error, ResourceId, Result, ToolDefinition};
use locus_llm::{Credentials, LlmTool, ModelClient, ModelClientFactory, ModelSettings};
use locus_memory::MemoryStore;
use locus_tools::{ToolLoader, ToolSet};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    /// Holding the slug's lock, not yet started.
    Waiting,
    /// Swapping the previous context out for the new one.
    Teardown,
    Build,
    Ready,
    /// Last build failed. The next build or switch retries; a context from
    /// an earlier successful build stays available meanwhile.
    Failed,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Teardown => "teardown",
            Self::Build => "build",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A built agent: everything a runtime needs to run turns.
pub struct AgentContext {
    pub slug: String,
    pub spec: AgentSpec,
    pub settings: ModelSettings,
    pub model: Arc<dyn ModelClient>,
    pub memory: MemoryBinding,
    pub tools: ToolSet,
    /// Declared tools that could not be resolved, with the error text.
    pub tool_failures: Vec<(String, String)>,
    pub built_at: DateTime<Utc>,
}

impl AgentContext {
    pub fn resource_id(&self) -> &ResourceId {
        self.memory.resource_id()
    }

    pub fn system_prompt(&self) -> &str {
        &self.spec.prompt
    }

    /// Tool definitions as presented to the model.
    pub fn tool_definitions(&self) -> Vec<LlmTool> {
        self.tools
            .iter()
            .map(|tool| LlmTool {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("slug", &self.slug)
            .field("model", &self.settings.model_id)
            .field("region", &self.settings.region)
            .field("tools", &self.tools.list())
            .field("built_at", &self.built_at)
            .finish()
    }
}

/// Result of a bulk start. Failures never abort the other builds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StartupSummary {
    pub ready: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl StartupSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct AgentLifecycleManager {
    defaults: ModelDefaults,
    credentials: Credentials,
    loader: Arc<dyn ConfigLoader>,
    models: Arc<dyn ModelClientFactory>,
    tools: ToolLoader,
    store: Arc<MemoryStore>,
    active: DashMap<String, Arc<AgentContext>>,
    states: DashMap<String, LifecycleState>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AgentLifecycleManager {
    pub fn new(
        config: &AppConfig,
        loader: Arc<dyn ConfigLoader>,
        models: Arc<dyn ModelClientFactory>,
        tools: ToolLoader,
        store: Arc<MemoryStore>,
    ) -> Self {
        Self {
            defaults: config.models.clone(),
            credentials: config.credentials.clone(),
            loader,
            models,
            tools,
            store,
            active: DashMap::new(),
            states: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    pub fn tool_loader(&self) -> &ToolLoader {
        &self.tools
    }

    pub fn get(&self, slug: &str) -> Option<Arc<AgentContext>> {
        self.active.get(slug).map(|e| e.value().clone())
    }

    pub fn state(&self, slug: &str) -> LifecycleState {
        self.states
            .get(slug)
            .map(|s| *s.value())
            .unwrap_or(LifecycleState::Idle)
    }

    pub fn active_slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        slugs.sort();
        slugs
    }

    fn lock_for(&self, slug: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn set_state(&self, slug: &str, state: LifecycleState) {
        debug!("Agent {} -> {}", slug, state);
        self.states.insert(slug.to_string(), state);
    }

    /// Model and region for `spec`: the agent's own, else the app default.
    pub fn resolve_settings(&self, spec: &AgentSpec) -> ModelSettings {
        ModelSettings {
            model_id: spec
                .model
                .clone()
                .unwrap_or_else(|| self.defaults.default_model.clone()),
            region: spec
                .region
                .clone()
                .unwrap_or_else(|| self.defaults.default_region.clone()),
            credentials: self.credentials.clone(),
        }
    }

    /// Build (or rebuild) `slug`. Returns once the agent is Ready or the
    /// build failed. A rebuild replaces the context only on success and
    /// keeps the agent's tool connections.
    pub async fn build(&self, slug: &str) -> Result<Arc<AgentContext>> {
        let lock = self.lock_for(slug);
        let _guard = lock.lock().await;
        self.build_locked(slug).await
    }

    /// Existing handle if `slug` is Ready, otherwise build it. Other active
    /// agents are left alone.
    pub async fn switch_to(&self, slug: &str) -> Result<Arc<AgentContext>> {
        let lock = self.lock_for(slug);
        let _guard = lock.lock().await;
        if self.state(slug) == LifecycleState::Ready {
            if let Some(existing) = self.get(slug) {
                debug!("Agent {} already ready", slug);
                return Ok(existing);
            }
        }
        self.build_locked(slug).await
    }

    async fn build_locked(&self, slug: &str) -> Result<Arc<AgentContext>> {
        self.set_state(slug, LifecycleState::Waiting);
        self.set_state(slug, LifecycleState::Build);
        match self.assemble(slug).await {
            Ok(context) => {
                let context = Arc::new(context);
                if self.active.contains_key(slug) {
                    self.set_state(slug, LifecycleState::Teardown);
                }
                self.active.insert(slug.to_string(), context.clone());
                self.set_state(slug, LifecycleState::Ready);
                info!(
                    "Agent {} ready: model={} region={} tools={}",
                    slug,
                    context.settings.model_id,
                    context.settings.region,
                    context.tools.len()
                );
                Ok(context)
            }
            Err(e) => {
                self.set_state(slug, LifecycleState::Failed);
                if self.active.contains_key(slug) {
                    warn!("Agent {} failed to rebuild, keeping previous context: {}", slug, e);
                } else {
                    warn!("Agent {} failed to build: {}", slug, e);
                }
                Err(e)
            }
        }
    }

    async fn assemble(&self, slug: &str) -> Result<AgentContext> {
        let loader = self.loader.clone();
        let owned = slug.to_string();
        let spec = blocking(move || loader.load_agent(&owned)).await?;
        spec.validate()?;

        let settings = self.resolve_settings(&spec);
        let memory = MemoryBinding::new(ResourceId::new(slug), self.store.clone());

        let definitions = self.tool_definitions_for(&spec).await?;
        let loader = self.loader.clone();
        let loaded = self
            .tools
            .load(slug, &spec.tools, move |id| {
                let prefetched = definitions.lock().ok().and_then(|mut d| d.remove(id));
                prefetched.unwrap_or_else(|| loader.tool_definition(id))
            })
            .await;
        let tool_failures = loaded
            .failures
            .into_iter()
            .map(|(id, e)| (id, e.to_string()))
            .collect();

        let model = self.models.create(&settings)?;

        Ok(AgentContext {
            slug: slug.to_string(),
            spec,
            settings,
            model,
            memory,
            tools: loaded.tools,
            tool_failures,
            built_at: Utc::now(),
        })
    }

    /// Read every declared tool definition on the blocking pool ahead of
    /// resolution.
    async fn tool_definitions_for(
        &self,
        spec: &AgentSpec,
    ) -> Result<StdMutex<HashMap<String, Result<ToolDefinition>>>> {
        let loader = self.loader.clone();
        let ids = spec.tools.uses.clone();
        let definitions = blocking(move || {
            Ok(ids
                .into_iter()
                .map(|id| {
                    let definition = loader.tool_definition(&id);
                    (id, definition)
                })
                .collect::<HashMap<_, _>>())
        })
        .await?;
        Ok(StdMutex::new(definitions))
    }

    /// Release the agent's tool connections and drop its context. Returns
    /// false if there was nothing to tear down.
    pub async fn teardown(&self, slug: &str) -> bool {
        let lock = self.lock_for(slug);
        let _guard = lock.lock().await;

        let had_context = self.active.contains_key(slug);
        if !had_context && self.tools.connection_count(slug) == 0 {
            self.states.remove(slug);
            return false;
        }

        self.set_state(slug, LifecycleState::Teardown);
        self.active.remove(slug);
        let released = self.tools.release(slug).await;
        self.set_state(slug, LifecycleState::Idle);
        info!("Agent {} torn down ({} connections released)", slug, released);
        true
    }

    /// Tear down every agent and drop all caches.
    pub async fn shutdown(&self) {
        for slug in self.active_slugs() {
            self.teardown(&slug).await;
        }
        let leftover = self.tools.release_all().await;
        if leftover > 0 {
            debug!("Released {} connections of inactive agents", leftover);
        }
        self.store.conversations().clear_cache();
        info!("Lifecycle manager shut down");
    }

    /// Build every slug in order. Per-agent failures are logged and
    /// collected.
    pub async fn start_all(&self, slugs: &[String]) -> StartupSummary {
        let mut summary = StartupSummary::default();
        for slug in slugs {
            match self.build(slug).await {
                Ok(_) => summary.ready.push(slug.clone()),
                Err(e) => summary.failed.push((slug.clone(), e.to_string())),
            }
        }
        info!(
            "Started {} agents, {} failed",
            summary.ready.len(),
            summary.failed.len()
        );
        summary
    }

    /// Build every agent the config loader knows about.
    pub async fn start_configured(&self) -> Result<StartupSummary> {
        let loader = self.loader.clone();
        let slugs = blocking(move || loader.agent_slugs()).await?;
        if slugs.is_empty() {
            warn!("No agents configured");
        }
        Ok(self.start_all(&slugs).await)
    }
}

/// Run a synchronous config read on the blocking pool.
async fn blocking<T, F>(read: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(read)
        .await
        .map_err(|e| Error::Internal(format!("config loader task failed: {}", e)))?
}
