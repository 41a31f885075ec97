//! FolderMirror Monitor - shared-folder change router.
//!
//! This binary watches the shared root recursively and reports file activity
//! to the repository that owns each changed path.
//!
//! # Commands
//!
//! - `foldermirror-monitor run`: Start the monitor daemon
//! - `foldermirror-monitor classify <PATH>...`: Show how relative paths are routed
//! - `foldermirror-monitor repositories`: List repositories under the root
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use foldermirror_monitor::config::{Config, LogFormat};
use foldermirror_monitor::registry::RepositoryRegistry;
use foldermirror_monitor::repository::{
    discover_repositories, undiscovered_repositories, ChannelRepository, DEFAULT_ACTIVITY_QUEUE,
};
use foldermirror_monitor::router::EventRouter;
use foldermirror_monitor::types::{ActivityNotification, RawChangeEvent};
use foldermirror_monitor::watcher::FileWatcher;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// How often the root is rescanned for newly added repositories.
const RESCAN_INTERVAL_SECS: u64 = 30;

/// FolderMirror Monitor - shared-folder change router.
///
/// Watches the shared root and tells each repository about changes inside
/// its own folder, ignoring version-control bookkeeping.
#[derive(Parser, Debug)]
#[command(name = "foldermirror-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    FOLDERMIRROR_ROOT_DIR         Shared root (default: ~/FolderMirror)
    FOLDERMIRROR_METADATA_DIR     Metadata directory name (default: .git)
    FOLDERMIRROR_IGNORE_PREFIXES  Comma-separated file name prefixes to ignore
    FOLDERMIRROR_BUFFER_SIZE      Raw event buffer size (default: 1000)
    FOLDERMIRROR_LOG_FORMAT       pretty or json (default: pretty)

EXAMPLES:
    # Start the monitor
    foldermirror-monitor run

    # Check how a path would be routed
    foldermirror-monitor classify project-a/docs/readme.txt project-a/.git/index
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the monitor daemon.
    Run,

    /// Print the routing decision for root-relative paths as JSON lines.
    Classify {
        /// Paths relative to the shared root, `/` separated.
        #[arg(required = true)]
        paths: Vec<String>,

        /// Override the shared root.
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// List the repositories found under the shared root.
    Repositories,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Run => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_monitor(config))
        }
        Command::Classify { paths, root } => run_classify(config, paths, root),
        Command::Repositories => run_repositories(&config),
    }
}

/// Runs the classify command.
fn run_classify(mut config: Config, paths: Vec<String>, root: Option<PathBuf>) -> Result<()> {
    if let Some(root) = root {
        config.root_dir = root;
    }
    let classifier = config.classifier();

    for path in paths {
        let line = serde_json::json!({
            "path": path,
            "classification": classifier.classify(&path),
        });
        println!("{line}");
    }

    Ok(())
}

/// Runs the repositories command.
fn run_repositories(config: &Config) -> Result<()> {
    let names = discover_repositories(&config.root_dir, &config.metadata_dir).context(format!(
        "Failed to list repositories in {}",
        config.root_dir.display()
    ))?;

    for name in names {
        println!("{name}");
    }

    Ok(())
}

/// Runs the monitor daemon.
async fn run_monitor(config: Config) -> Result<()> {
    init_logging(config.log_format);

    info!(
        root_dir = %config.root_dir.display(),
        metadata_dir = %config.metadata_dir,
        buffer_size = config.buffer_size,
        "Starting FolderMirror Monitor"
    );

    if !config.root_dir.exists() {
        info!(root_dir = %config.root_dir.display(), "Creating shared root");
        std::fs::create_dir_all(&config.root_dir).context("Failed to create shared root")?;
    }

    let registry = Arc::new(RepositoryRegistry::new());
    let mut activity_tasks = Vec::new();

    for name in discover_repositories(&config.root_dir, &config.metadata_dir)
        .context("Failed to discover repositories")?
    {
        activity_tasks.push(add_repository(&registry, name));
    }

    if registry.is_empty() {
        warn!(
            root_dir = %config.root_dir.display(),
            "No repositories found, changes will be ignored until one is added"
        );
    }

    let (raw_tx, raw_rx) = mpsc::channel::<RawChangeEvent>(config.buffer_size);
    let watcher = FileWatcher::new(config.root_dir.clone(), raw_tx).context(format!(
        "Failed to initialize file watcher for {}",
        config.root_dir.display()
    ))?;

    let router = EventRouter::new(config.classifier(), Arc::clone(&registry));
    let router_task = tokio::spawn(async move { router.run(raw_rx).await });

    info!("Monitor running. Press Ctrl+C to stop.");

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let mut rescan = tokio::time::interval(Duration::from_secs(RESCAN_INTERVAL_SECS));
    rescan.tick().await;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutdown signal received");
                break;
            }

            _ = rescan.tick() => {
                match undiscovered_repositories(&registry, &config.root_dir, &config.metadata_dir) {
                    Ok(names) => {
                        for name in names {
                            info!(repository = %name, "Repository added");
                            activity_tasks.push(add_repository(&registry, name));
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to rescan repositories"),
                }
            }
        }
    }

    // Dropping the watcher drops the only sender and ends the router loop.
    drop(watcher);

    match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), router_task).await {
        Ok(Ok(stats)) => debug!(?stats, "Router finished"),
        Ok(Err(e)) => warn!(error = %e, "Router task failed"),
        Err(_) => warn!("Router did not stop within the shutdown timeout"),
    }

    for name in registry.names() {
        registry.unregister(&name);
    }
    for task in activity_tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Activity task failed");
        }
    }

    info!("Monitor stopped");
    Ok(())
}

/// Registers a channel-backed handle for `name` and spawns its activity logger.
fn add_repository(registry: &RepositoryRegistry, name: String) -> JoinHandle<()> {
    let (repository, activity_rx) = ChannelRepository::new(name.clone(), DEFAULT_ACTIVITY_QUEUE);
    registry.register(Arc::new(repository));
    tokio::spawn(log_activity(name, activity_rx))
}

/// Logs the activity delivered to one repository, in delivery order.
async fn log_activity(repository: String, mut rx: mpsc::Receiver<ActivityNotification>) {
    while let Some(notification) = rx.recv().await {
        info!(
            repository = %repository,
            file_name = %notification.file_name,
            path = %notification.absolute_path.display(),
            "File activity"
        );
    }
    debug!(repository = %repository, "Activity queue closed");
}

/// Initializes the logging subsystem.
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .init(),
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            res = signal::ctrl_c() => res.context("Failed to listen for Ctrl+C")?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    Ok(())
}
