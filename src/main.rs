//! dashsync CLI
//!
//! Command-line front end for the dashboard sync engine:
//! - Keep a local copy in sync with the server
//! - Sign in, register and sign out
//! - Inspect the cache and preview the packed layout

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dashsync::cache::{CacheStore, FileStore, KeyValueStore};
use dashsync::config::{generate_default_config, Config};
use dashsync::layout;
use dashsync::model::{LocalModel, Snapshot};
use dashsync::push::PushClient;
use dashsync::remote::HttpApi;
use dashsync::sync::{Session, SessionStore, SyncEngine, SyncHandle};

#[derive(Parser)]
#[command(name = "dashsync")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Keep a personal dashboard in sync with its server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Dashboard server URL, overriding the config
    #[arg(long, global = true)]
    pub server: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synchronize until interrupted
    Run,

    /// Sign in and remember the session
    Login {
        username: String,
        /// Password (default: $DASHSYNC_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Register {
        username: String,
        /// Password (default: $DASHSYNC_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session and cached dashboard
    Logout,

    /// Print the packed layout of a snapshot file
    Layout {
        /// Snapshot JSON file
        file: PathBuf,
        /// Column count (default: from config)
        #[arg(long)]
        columns: Option<u32>,
        /// Use the mobile grid and hide mobile-hidden widgets
        #[arg(long)]
        mobile: bool,
    },

    /// Show session and cache state
    Status,

    /// Flush pending edits and write the dashboard as JSON
    Export {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }

    init_logging(&config);

    match cli.command {
        Commands::Run => run(&config).await,
        Commands::Login { username, password } => {
            authenticate(&config, username, password, false).await
        }
        Commands::Register { username, password } => {
            authenticate(&config, username, password, true).await
        }
        Commands::Logout => logout(&config),
        Commands::Layout {
            file,
            columns,
            mobile,
        } => print_layout(&config, &file, columns, mobile),
        Commands::Status => status(&config),
        Commands::Export { output } => export(&config, output).await,
        Commands::Config { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
            Ok(())
        }
    }
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("dashsync={}", config.logging.level).into());
    let json = config.logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

fn open_store(config: &Config) -> anyhow::Result<Arc<dyn KeyValueStore>> {
    let dir = config.cache.path();
    let store = FileStore::open(&dir).with_context(|| format!("Failed to open cache {:?}", dir))?;
    Ok(Arc::new(store))
}

/// Engine with no push channel, for one-shot commands
fn start_engine(config: &Config) -> anyhow::Result<(SyncHandle, tokio::task::JoinHandle<()>)> {
    let api = Arc::new(HttpApi::new(config.api_config())?);
    let (engine, handle) = SyncEngine::new(api, open_store(config)?, config.engine_config());
    let (_events, events_rx) = mpsc::channel(1);
    Ok((handle, tokio::spawn(engine.run(events_rx))))
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let api = Arc::new(HttpApi::new(config.api_config())?);
    let (engine, handle) = SyncEngine::new(api, open_store(config)?, config.engine_config());

    let (events_tx, events_rx) = mpsc::channel(64);
    let push = PushClient::new(
        config.push_config()?,
        engine.session_id(),
        engine.token_watch(),
        events_tx,
    );
    let push_task = tokio::spawn(push.run());
    let engine_task = tokio::spawn(engine.run(events_rx));

    tracing::info!(server = %config.server.base_url, "Synchronizing, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    handle.shutdown().await?;
    engine_task.await?;
    push_task.abort();

    tracing::info!("dashsync shutdown complete");
    Ok(())
}

async fn authenticate(
    config: &Config,
    username: String,
    password: Option<String>,
    register: bool,
) -> anyhow::Result<()> {
    let password = match password.or_else(|| std::env::var("DASHSYNC_PASSWORD").ok()) {
        Some(password) => password,
        None => bail!("No password given; use --password or DASHSYNC_PASSWORD"),
    };

    let (handle, task) = start_engine(config)?;
    if register {
        handle.register(username, password).await?;
    } else {
        handle.login(username, password).await?;
    }

    let status = handle.status().await?;
    let snapshot = handle.snapshot().await?;
    println!(
        "Signed in as {} ({} widgets, {} groups)",
        status.identity,
        snapshot.widgets.len(),
        snapshot.groups.len()
    );

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

fn logout(config: &Config) -> anyhow::Result<()> {
    let kv = open_store(config)?;
    let sessions = SessionStore::new(Arc::clone(&kv));

    match sessions.load() {
        Some(record) => {
            let username = record.username.clone();
            let mut session = Session::restore(Some(record));
            session.sign_out();
            sessions.store(&session)?;
            CacheStore::new(kv).clear()?;
            println!("Signed out {}", username);
        }
        None => println!("Not signed in."),
    }
    Ok(())
}

fn print_layout(
    config: &Config,
    file: &Path,
    columns: Option<u32>,
    mobile: bool,
) -> anyhow::Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {:?}", file))?;
    let snapshot: Snapshot = serde_json::from_str(&content)
        .with_context(|| format!("{:?} is not a dashboard snapshot", file))?;
    let model = LocalModel::from_snapshot(snapshot);

    let columns = columns.unwrap_or_else(|| config.columns(mobile));
    let shown = layout::visible(&model.snapshot().widgets, mobile);
    let placed = layout::place(&shown, columns);

    println!(
        "{:<38} {:<14} {:>3} {:>3} {:>3} {:>3}",
        "Widget", "Kind", "X", "Y", "W", "H"
    );
    println!("{}", "-".repeat(70));
    for widget in &placed {
        println!(
            "{:<38} {:<14} {:>3} {:>3} {:>3} {:>3}",
            widget.id,
            widget.kind_name(),
            widget.x.unwrap_or(0),
            widget.y.unwrap_or(0),
            widget.width(),
            widget.height()
        );
    }
    println!();
    println!("{} widgets on a {}-column grid", placed.len(), columns);
    Ok(())
}

fn status(config: &Config) -> anyhow::Result<()> {
    let kv = open_store(config)?;

    println!("dashsync v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Server: {}", config.server.base_url);

    match SessionStore::new(Arc::clone(&kv)).load() {
        Some(record) => println!(
            "Session: {}{}",
            record.username,
            if record.is_admin { " (admin)" } else { "" }
        ),
        None => println!("Session: signed out"),
    }

    match CacheStore::new(kv).peek() {
        Some(entry) => {
            let age_secs = (chrono::Utc::now().timestamp_millis() - entry.saved_at).max(0) / 1000;
            println!();
            println!("Cache:");
            println!("  Owner: {}", entry.owner.as_deref().unwrap_or("<public>"));
            println!("  Age: {}", format_duration(age_secs as u64));
            println!("  Widgets: {}", entry.snapshot.widgets.len());
            println!("  Groups: {}", entry.snapshot.groups.len());
        }
        None => {
            println!();
            println!("Cache: empty");
        }
    }
    Ok(())
}

async fn export(config: &Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let (handle, task) = start_engine(config)?;
    // Let the cold-start fetch land before exporting
    handle.refresh().await?;
    let json = handle.export().await?;
    handle.shutdown().await?;
    task.await?;

    match output {
        Some(path) => {
            std::fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Dashboard exported to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn format_duration(secs: u64) -> String {
    let days = secs / 86400;
    let hours = (secs % 86400) / 3600;
    let minutes = (secs % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", secs)
    }
}
