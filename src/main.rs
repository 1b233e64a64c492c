//! locus - inspect local agent memory and agent configuration
//!
//! Usage:
//!   locus conversations --user u1          → list conversations, newest first
//!   locus messages c1 --limit 20           → tail of a conversation log
//!   locus working agent-a --user u1        → a user's working memory note
//!   locus suspended nightly-import         → suspended workflow runs
//!   locus agents                           → validate configured agents
//!   locus version                          → show version

use anyhow::Context;
use chrono::SecondsFormat;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use locus_agent::{AppConfig, ConfigLoader, FsConfigLoader};
use locus_core::{
    ConversationId, ConversationQuery, Direction, OrderBy, ResourceId, WorkingMemoryScope,
};
use locus_memory::MemoryStore;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "locus",
    about = "Local-first agent memory and lifecycle",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (TOML). Defaults to $LOCUS_CONFIG or ~/.locus/locus.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Storage root, overriding config and $LOCUS_ROOT
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Also write logs to daily files in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortField {
    Created,
    Updated,
    Title,
}

impl From<SortField> for OrderBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Created => OrderBy::CreatedAt,
            SortField::Updated => OrderBy::UpdatedAt,
            SortField::Title => OrderBy::Title,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations
    Conversations {
        #[arg(long)]
        resource: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long, value_enum, default_value = "updated")]
        order_by: SortField,
        /// Ascending instead of descending
        #[arg(long, default_value_t = false)]
        asc: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Print a conversation's messages, one JSON object per line
    Messages {
        conversation: String,
        /// Only the last N messages
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a working memory note
    #[command(group(ArgGroup::new("scope").required(true).args(["conversation", "user"])))]
    Working {
        resource: String,
        #[arg(long)]
        conversation: Option<String>,
        #[arg(long)]
        user: Option<String>,
    },
    /// List suspended executions of a workflow
    Suspended { workflow: String },
    /// Validate every configured agent and the tools it declares
    Agents,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Commands::Version = cli.command {
        println!("locus v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let _guard = init_tracing(cli.log_dir.as_deref())?;

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path).with_env_overrides();
    if let Some(root) = &cli.root {
        config.storage.root = root.clone();
    }
    let store = MemoryStore::open(&config.storage.root);
    tracing::debug!("Storage root {}", config.storage.root.display());

    match cli.command {
        Commands::Conversations {
            resource,
            user,
            order_by,
            asc,
            limit,
            offset,
        } => {
            let query = ConversationQuery {
                user_id: user,
                resource_id: resource.map(ResourceId::new),
                order_by: order_by.into(),
                direction: if asc { Direction::Asc } else { Direction::Desc },
                limit,
                offset,
            };
            let conversations = store.conversations().query(&query).await?;
            if conversations.is_empty() {
                println!("No conversations.");
            }
            for c in conversations {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    c.id,
                    c.resource_id,
                    if c.user_id.is_empty() { "-" } else { c.user_id.as_str() },
                    c.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    c.title
                );
            }
        }

        Commands::Messages {
            conversation,
            limit,
        } => {
            let id = ConversationId::new(conversation);
            let messages = store
                .read_messages(&id, limit)
                .await
                .with_context(|| format!("reading messages of {}", id))?;
            for m in messages {
                println!("{}", serde_json::to_string(&m)?);
            }
        }

        Commands::Working {
            resource,
            conversation,
            user,
        } => {
            let scope = match (conversation, user) {
                (Some(c), _) => WorkingMemoryScope::conversation(c),
                (None, Some(u)) => WorkingMemoryScope::user(u),
                (None, None) => anyhow::bail!("one of --conversation or --user is required"),
            };
            match store.working().get(&ResourceId::new(resource), &scope).await? {
                Some(record) => {
                    println!(
                        "# updated {}",
                        record.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
                    );
                    println!("{}", record.content);
                }
                None => println!("No working memory."),
            }
        }

        Commands::Suspended { workflow } => {
            let suspended = store.workflows().get_suspended(&workflow).await?;
            if suspended.is_empty() {
                println!("No suspended runs of {}.", workflow);
            }
            for state in suspended {
                println!("{}", serde_json::to_string(&state)?);
            }
        }

        Commands::Agents => check_agents(&config.agents.config_dir)?,

        Commands::Version => {}
    }

    Ok(())
}

/// Load and validate every agent spec and its tool definitions without
/// connecting anything.
fn check_agents(config_dir: &Path) -> anyhow::Result<()> {
    let loader = FsConfigLoader::new(config_dir);
    let slugs = loader
        .agent_slugs()
        .with_context(|| format!("listing agents in {}", config_dir.display()))?;
    if slugs.is_empty() {
        println!("No agents configured in {}.", config_dir.display());
        return Ok(());
    }

    let mut failed = 0;
    for slug in &slugs {
        let spec = match loader.load_agent(slug) {
            Ok(spec) => spec,
            Err(e) => {
                println!("FAIL {}: {}", slug, e);
                failed += 1;
                continue;
            }
        };

        let mut tool_errors = Vec::new();
        for tool_id in &spec.tools.uses {
            if let Err(e) = loader.tool_definition(tool_id).and_then(|d| d.validate()) {
                tool_errors.push(format!("{}: {}", tool_id, e));
            }
        }

        if tool_errors.is_empty() {
            println!(
                "ok   {} ({}, model={}, tools=[{}])",
                slug,
                spec.name,
                spec.model.as_deref().unwrap_or("default"),
                spec.tools.uses.join(", ")
            );
        } else {
            println!("WARN {}: {}", slug, tool_errors.join("; "));
        }
    }

    println!("{} agents, {} failed", slugs.len(), failed);
    if failed > 0 {
        anyhow::bail!("{} agent spec(s) failed validation", failed);
    }
    Ok(())
}

fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "locus=info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log dir {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "locus.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                )
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
