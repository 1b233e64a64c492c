//! Tests for locus-tools: ToolResult, ToolSet, and ToolLoader caching,
//! allow-list filtering, and failure isolation with fake tool servers

use locus_core::{Error, Result, ToolDefinition, ToolsSpec};
use locus_tools::*;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ===========================================================================
// Fakes
// ===========================================================================

#[derive(Default)]
struct Counters {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

struct FakeClient {
    tools: Vec<&'static str>,
    counters: Arc<Counters>,
    fail_connect: bool,
    fail_disconnect: bool,
}

#[async_trait::async_trait]
impl McpClient for FakeClient {
    async fn connect(&self) -> Result<()> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(Error::Internal("server exited".into()));
        }
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<RemoteToolInfo>> {
        Ok(self
            .tools
            .iter()
            .map(|n| RemoteToolInfo {
                name: n.to_string(),
                description: format!("{} tool", n),
                input_schema: json!({"type": "object"}),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value) -> Result<Value> {
        Ok(json!({"called": name, "args": args}))
    }

    async fn disconnect(&self) -> Result<()> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect {
            return Err(Error::Internal("already gone".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct FakeConnector {
    servers: HashMap<String, Vec<&'static str>>,
    failing_connect: Vec<String>,
    failing_disconnect: Vec<String>,
    counters: Arc<Counters>,
}

impl FakeConnector {
    fn with_server(mut self, id: &str, tools: &[&'static str]) -> Self {
        self.servers.insert(id.to_string(), tools.to_vec());
        self
    }
}

impl McpConnector for FakeConnector {
    fn client_for(&self, definition: &ToolDefinition) -> Result<Arc<dyn McpClient>> {
        let transport = definition.transport.clone().unwrap_or_default();
        if transport != "stdio" {
            return Err(Error::unsupported_transport(&definition.id, transport));
        }
        Ok(Arc::new(FakeClient {
            tools: self.servers.get(&definition.id).cloned().unwrap_or_default(),
            counters: self.counters.clone(),
            fail_connect: self.failing_connect.contains(&definition.id),
            fail_disconnect: self.failing_disconnect.contains(&definition.id),
        }))
    }
}

fn definitions() -> impl Fn(&str) -> Result<ToolDefinition> {
    |id: &str| match id {
        "files" | "search" | "broken" => Ok(ToolDefinition::mcp_stdio(id, format!("mcp-{}", id))),
        "websocket" => {
            let mut def = ToolDefinition::mcp_stdio(id, "mcp-ws");
            def.transport = Some("ws".into());
            Ok(def)
        }
        "clock" => Ok(ToolDefinition::builtin(id, Some(json!({"tz": "UTC"})))),
        other => Err(Error::not_found(locus_core::EntityKind::Tool, other)),
    }
}

fn uses(ids: &[&str]) -> ToolsSpec {
    ToolsSpec {
        uses: ids.iter().map(|s| s.to_string()).collect(),
        allowed: Some(vec!["*".into()]),
        aliases: Default::default(),
    }
}

struct ClockTool;

#[async_trait::async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str { "now" }
    fn description(&self) -> &str { "current time" }
    fn input_schema(&self) -> Value { json!({"type": "object"}) }
    fn origin(&self) -> ToolOrigin { ToolOrigin::Builtin { tool_id: "clock".into() } }
    async fn invoke(&self, _args: Value) -> ToolResult { ToolResult::text("12:00") }
}

fn catalog() -> BuiltinCatalog {
    let mut catalog = BuiltinCatalog::new();
    catalog.register("clock", |_def: &ToolDefinition| -> Result<Vec<Arc<dyn Tool>>> {
        Ok(vec![Arc::new(ClockTool)])
    });
    catalog
}

fn loader(connector: FakeConnector) -> (ToolLoader, Arc<Counters>) {
    let counters = connector.counters.clone();
    (ToolLoader::new(Arc::new(connector), catalog()), counters)
}

// ===========================================================================
// ToolResult / ToolSet
// ===========================================================================

#[test]
fn tool_result_variants() {
    assert_eq!(ToolResult::text("hello").to_content_string(), "hello");
    let e = ToolResult::error("boom");
    assert!(e.is_error());
    assert_eq!(e.to_content_string(), "Error: boom");
    assert!(ToolResult::Json(json!({"k": 1})).to_content_string().contains("\"k\""));
}

#[tokio::test]
async fn tool_set_invoke_missing_tool() {
    let set = ToolSet::new();
    assert!(set.is_empty());
    let result = set.invoke("nonexistent", json!({})).await;
    assert!(result.is_error());
    assert!(result.to_content_string().contains("not found"));
}

// ===========================================================================
// ToolLoader
// ===========================================================================

#[tokio::test]
async fn wildcard_keeps_every_tool() {
    let (loader, counters) = loader(FakeConnector::default().with_server("files", &["read_file", "write_file"]));
    let loaded = loader.load("writer", &uses(&["files", "clock"]), definitions()).await;

    assert!(loaded.failures.is_empty());
    assert_eq!(loaded.tools.list(), vec!["now", "read_file", "write_file"]);
    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
    assert_eq!(
        loaded.tools.get("read_file").unwrap().origin(),
        ToolOrigin::Mcp { tool_id: "files".into() }
    );
}

#[tokio::test]
async fn second_load_reuses_cached_connection() {
    let (loader, counters) = loader(FakeConnector::default().with_server("files", &["read_file"]));
    loader.load("writer", &uses(&["files"]), definitions()).await;
    let again = loader.load("writer", &uses(&["files"]), definitions()).await;

    assert_eq!(again.tools.len(), 1);
    assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
    assert_eq!(loader.connection_count("writer"), 1);

    // Another agent gets its own connection.
    loader.load("editor", &uses(&["files"]), definitions()).await;
    assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn allow_list_filters_and_reports_unmatched() {
    let (loader, _) = loader(FakeConnector::default().with_server("files", &["read_file", "write_file"]));
    let mut spec = uses(&["files"]);
    spec.allowed = Some(vec!["read_file".into(), "delete_file".into()]);

    let loaded = loader.load("writer", &spec, definitions()).await;
    assert_eq!(loaded.tools.list(), vec!["read_file"]);
    assert_eq!(loaded.unmatched_allow_entries, vec!["delete_file".to_string()]);
}

#[tokio::test]
async fn aliases_rename_and_route_to_original() {
    let (loader, _) = loader(FakeConnector::default().with_server("files", &["read_file", "write_file"]));
    let mut spec = uses(&["files"]);
    spec.aliases.insert("read_file".into(), "read".into());
    spec.allowed = Some(vec!["read".into()]);

    let loaded = loader.load("writer", &spec, definitions()).await;
    assert_eq!(loaded.tools.list(), vec!["read"]);

    let result = loaded.tools.invoke("read", json!({"path": "a.txt"})).await;
    match result {
        ToolResult::Json(v) => assert_eq!(v["called"], json!("read_file")),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn allow_list_matches_original_name_of_aliased_tool() {
    let (loader, _) = loader(FakeConnector::default().with_server("files", &["read_file"]));
    let mut spec = uses(&["files"]);
    spec.aliases.insert("read_file".into(), "read".into());
    spec.allowed = Some(vec!["read_file".into()]);

    let loaded = loader.load("writer", &spec, definitions()).await;
    assert_eq!(loaded.tools.list(), vec!["read"]);
    assert!(loaded.unmatched_allow_entries.is_empty());
}

#[tokio::test]
async fn connection_failure_omits_only_that_tool() {
    let mut connector = FakeConnector::default()
        .with_server("files", &["read_file"])
        .with_server("broken", &["never"]);
    connector.failing_connect.push("broken".into());
    let (loader, _) = loader(connector);

    let loaded = loader
        .load("writer", &uses(&["broken", "files", "websocket", "missing"]), definitions())
        .await;

    assert_eq!(loaded.tools.list(), vec!["read_file"]);
    assert_eq!(loaded.failures.len(), 3);
    let by_id: HashMap<_, _> = loaded.failures.iter().map(|(id, e)| (id.as_str(), e)).collect();
    assert!(matches!(by_id["broken"], Error::Connection { .. }));
    assert!(matches!(by_id["websocket"], Error::UnsupportedTransport { .. }));
    assert!(by_id["missing"].is_not_found());

    // Failed connections are not cached.
    assert_eq!(loader.connection_count("writer"), 1);
}

#[tokio::test]
async fn unregistered_builtin_is_not_found() {
    let loader = ToolLoader::new(Arc::new(FakeConnector::default()), BuiltinCatalog::new());
    let loaded = loader.load("writer", &uses(&["clock"]), definitions()).await;
    assert!(loaded.tools.is_empty());
    assert!(loaded.failures[0].1.is_not_found());
}

#[tokio::test]
async fn release_disconnects_everything_despite_failures() {
    let mut connector = FakeConnector::default()
        .with_server("files", &["read_file"])
        .with_server("search", &["find"]);
    connector.failing_disconnect.push("files".into());
    let (loader, counters) = loader(connector);

    loader.load("writer", &uses(&["files", "search"]), definitions()).await;
    loader.load("editor", &uses(&["search"]), definitions()).await;

    assert_eq!(loader.release("writer").await, 2);
    assert_eq!(counters.disconnects.load(Ordering::SeqCst), 2);
    assert_eq!(loader.connection_count("writer"), 0);
    assert_eq!(loader.connection_count("editor"), 1);

    // After release the next load connects again.
    loader.load("writer", &uses(&["search"]), definitions()).await;
    assert_eq!(counters.connects.load(Ordering::SeqCst), 4);

    assert_eq!(loader.release_all().await, 2);
    assert_eq!(loader.connection_count("editor"), 0);
}
