//! # Agendum — appointment reminder service
//!
//! Finds appointments due inside a 15-minute lookahead window and notifies
//! their owners across native push, web push, email, and the live in-app
//! event stream. A second, slower sweep demotes expired trial accounts.
//!
//! Usage:
//!   agendum                       # Start the service (default port 4000)
//!   agendum --port 8080           # Custom gateway port
//!   agendum --db-path ./dev.db    # Custom database location

use std::sync::Arc;

use agendum_channels::{ExpoClient, LiveEventHub, PushGateway, SmtpMailer, WebPushClient};
use agendum_core::AgendumConfig;
use agendum_gateway::AppState;
use agendum_scheduler::{ReminderDispatcher, TrialSweeper};
use agendum_store::AgendumDb;
use anyhow::Result;
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agendum",
    version,
    about = "📅 Agendum — appointment reminders across push, email, and live events"
)]
struct Cli {
    /// Gateway port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Config file path (defaults to ~/.agendum/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Database path (overrides config)
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "agendum=debug,tower_http=debug"
    } else {
        "agendum=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AgendumConfig::load_from(std::path::Path::new(path))?,
        None => AgendumConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db_path) = &cli.db_path {
        config.db_path = Some(db_path.clone());
    }

    // Open database
    let db_path = config.resolved_db_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = Arc::new(Mutex::new(AgendumDb::open(&db_path)?));

    // Delivery channels
    let push: Arc<dyn agendum_core::traits::PushSender> = Arc::new(PushGateway::new(
        ExpoClient::new(&config.push),
        WebPushClient::new(&config.push),
    ));
    let mailer: Arc<dyn agendum_core::traits::Mailer> =
        Arc::new(SmtpMailer::new(config.email.clone())?);
    if !config.email.enabled || config.email.email.is_empty() {
        tracing::warn!("⚠️  SMTP not configured — reminder emails will fail until it is");
    }

    // One live-event hub for the process lifetime, shared by the dispatcher
    // and every WebSocket connection
    let hub = LiveEventHub::default();

    // Periodic jobs
    let dispatcher =
        ReminderDispatcher::new(store.clone(), push.clone(), mailer.clone(), hub.clone());
    let sweeper = TrialSweeper::new(store.clone());
    let scheduler = agendum_scheduler::spawn(dispatcher, sweeper, &config.scheduler);

    println!("📅 Agendum v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 Gateway:   http://{}:{}", config.gateway.bind, config.gateway.port);
    println!("   🗄️  Database:  {}", db_path.display());
    println!(
        "   ⏰ Sweeps:    reminders {}s / trials {}s",
        config.scheduler.reminder_interval_secs, config.scheduler.account_interval_secs
    );
    println!();

    // Serve until the process is stopped
    let state = Arc::new(AppState {
        db: store,
        hub,
        push,
        mailer,
        push_config: config.push.clone(),
        start_time: std::time::Instant::now(),
    });
    let result = agendum_gateway::serve(state, &config.gateway).await;

    scheduler.shutdown();
    result.map_err(|e| anyhow::anyhow!("{e}"))
}
