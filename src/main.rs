//! cuebridge - fire QLC+ cues from DJ player events
//!
//! Gateway between a DJ host's playback notifications and QLC+ virtual
//! console buttons over WebSocket.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cuebridge::config::{AppConfig, ConfigWatcher};
use cuebridge::sink::{ActionSink, LogSink, QlcSink, FULL_VALUE};
use cuebridge::{feed, Dispatcher};

/// cuebridge - fire QLC+ virtual console buttons at labeled cue points
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log fired actions instead of sending them to QLC+
    #[arg(long)]
    dry_run: bool,

    /// Fire one virtual console button at full value and exit
    #[arg(long, value_name = "ID")]
    fire: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting cuebridge...");
    info!("Configuration file: {}", args.config);

    // One-shot smoke test: no watcher, no feed server
    if let Some(action) = args.fire {
        return fire_once(&args.config, action).await;
    }

    // Load configuration with hot-reload watcher
    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    run_app(
        (*initial_config).clone(),
        config_watcher,
        args.dry_run,
        shutdown_signal(),
    )
    .await?;

    info!("cuebridge shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: ConfigWatcher,
    dry_run: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    // The QLC+ handle stays concrete so config reloads can repoint it;
    // the dispatcher only sees the sink trait
    let qlc = (!dry_run).then(|| Arc::new(QlcSink::new(config.qlc.url.clone())));
    let sink: Arc<dyn ActionSink> = match &qlc {
        Some(qlc) => qlc.clone(),
        None => {
            info!("Dry-run mode: actions will be logged, not sent");
            Arc::new(LogSink::new())
        },
    };

    let dispatcher = Dispatcher::new(sink.clone(), config.cues.prefix.clone());

    // Feed server for host notifications
    let (events_tx, mut events_rx) = feed::channel();
    let feed_addr = config.feed_addr()?;
    let running_bind = config.feed.bind.clone();
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed::start_server(feed_addr, events_tx).await {
            tracing::error!("Event feed failed: {:#}", e);
        }
    });

    info!(
        "Ready: cue prefix {:?}, QLC+ at {}",
        config.cues.prefix, config.qlc.url
    );

    // Main event loop
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Handle host events
            Some(event) = events_rx.recv() => {
                debug!("Host event: {:?}", event);
                dispatcher.on_event(event).await;
            }

            // Handle config reload
            Some(new_config) = config_watcher.next_config() => {
                info!("📝 Configuration file changed, applying...");
                dispatcher.set_prefix(&new_config.cues.prefix);
                if let Some(qlc) = &qlc {
                    qlc.update_endpoint(&new_config.qlc.url).await;
                }
                if new_config.feed.bind != running_bind {
                    warn!(
                        "⚠️ feed.bind changes need a restart (still listening on {})",
                        running_bind
                    );
                }
                info!("✅ Configuration applied");
            }

            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    feed_task.abort();
    if let Err(e) = sink.shutdown().await {
        warn!("Sink shutdown: {:#}", e);
    }
    info!("All resources released");

    Ok(())
}

/// Press one button at full value and release the connection: the
/// operational smoke test for a fresh QLC+ setup.
async fn fire_once(config_path: &str, action: u32) -> Result<()> {
    let config = match AppConfig::load(config_path).await {
        Ok(config) => config,
        Err(e) => {
            warn!("{:#}; using defaults", e);
            AppConfig::default()
        },
    };

    println!(
        "{} {} {} {}",
        "Firing action".cyan(),
        action.to_string().bold().cyan(),
        "via".cyan(),
        config.qlc.url.cyan()
    );

    let sink = QlcSink::new(config.qlc.url.clone());
    sink.fire(action, FULL_VALUE).await?;

    if sink.is_connected().await {
        println!("{}", "✅ delivered".green());
    } else {
        println!("{}", "❌ QLC+ unreachable (check qlc.url and that the web access is running)".red());
    }

    sink.shutdown().await?;
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
