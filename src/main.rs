//! aria: run the adaptive assistant core from the command line
//!
//! Usage:
//!   aria replay events.jsonl --user ana     → feed recorded perception, print stats
//!   aria search --store kb.jsonl --owner ana → query the knowledge store
//!   aria config                             → print the default config

use anyhow::Context;
use aria::{AriaConfig, AriaSystem, LogSpeaker};
use aria_core::{Clock, EntryKind, PerceptionEvent, SystemClock, UserId};
use aria_knowledge::{KnowledgeConfig, SearchFilter};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "aria",
    version = env!("CARGO_PKG_VERSION"),
    about = "Adaptive assistant core: perception fusion, attention, and per-user profiles"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines file of perception events through the system
    Replay {
        /// One perception event per line
        events: PathBuf,
        /// User the interactions belong to
        #[arg(short, long)]
        user: Option<String>,
        /// Knowledge store file (overrides the config)
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Search a knowledge store file
    Search {
        /// Knowledge store file
        #[arg(short, long)]
        store: PathBuf,
        /// Only entries owned by this user
        #[arg(short, long)]
        owner: Option<String>,
        /// Match any of these keywords (repeatable)
        #[arg(short, long)]
        keyword: Vec<String>,
        /// Only entries of this kind (conversation, preference, experience, ...)
        #[arg(long)]
        kind: Option<String>,
    },
    /// Print the default config as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Replay {
            events,
            user,
            store,
            config,
        } => replay(&events, user, store, config.as_deref()).await?,
        Commands::Search {
            store,
            owner,
            keyword,
            kind,
        } => search(store, owner, keyword, kind)?,
        Commands::Config => print!("{}", AriaConfig::default().to_toml()),
    }

    Ok(())
}

fn init_tracing(
    log_file: Option<&Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "aria=info,aria_sensorium=info,aria_knowledge=warn".into());
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry().with(filter).with(stderr).init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .context("--log-file must name a file")?;
    std::fs::create_dir_all(dir)?;
    let appender = tracing_appender::rolling::never(dir, name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

async fn replay(
    events: &Path,
    user: Option<String>,
    store: Option<PathBuf>,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let mut config = config.map(AriaConfig::load).unwrap_or_default();
    if store.is_some() {
        config.knowledge.path = store;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let system = AriaSystem::new(config, Arc::new(LogSpeaker), clock);
    system.set_active_user(user.map(UserId::from));
    system.start()?;

    let file = std::fs::File::open(events)
        .with_context(|| format!("cannot open {}", events.display()))?;
    let mut submitted = 0usize;
    for (n, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PerceptionEvent>(&line) {
            Ok(event) => {
                system.submit(event)?;
                submitted += 1;
            }
            Err(e) => warn!("Skipping line {} of {}: {}", n + 1, events.display(), e),
        }
    }

    system.stop().await;
    tracing::info!("Replayed {} events", submitted);
    println!("{}", serde_json::to_string_pretty(&system.stats())?);
    Ok(())
}

fn search(
    store: PathBuf,
    owner: Option<String>,
    keywords: Vec<String>,
    kind: Option<String>,
) -> anyhow::Result<()> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = KnowledgeConfig { path: Some(store) }.build(clock);

    let mut filter = SearchFilter::new();
    if let Some(owner) = owner {
        filter = filter.owner(owner);
    }
    if !keywords.is_empty() {
        filter = filter.keywords(keywords);
    }
    if let Some(kind) = kind {
        filter = filter.kind(EntryKind::from(kind));
    }

    for entry in store.search(&filter)? {
        println!("{}", serde_json::to_string(entry.as_ref())?);
    }
    Ok(())
}
