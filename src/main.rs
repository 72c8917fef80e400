// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use assetpack::cache::{AssetStore, CacheKey, Partition};
use assetpack::config::{default_root, Settings};
use assetpack::download::{AssetKind, DownloadManager, FetchOutcome};
use assetpack::handoff::{channel, ResourceHost, ResourceId};
use assetpack::report::{ErrorReporter, HttpReporter, TracingReporter};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long `fetch` waits for error reports before exiting.
const REPORT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "assetpack")]
#[command(version = VERSION)]
#[command(about = "Download, cache and hand off remote overlay assets.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store root (default: <data dir>/assetpack)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the directory tree and sidecar metadata
    Layout,

    /// Print the cache key for a locator
    Key {
        locator: String,
    },

    /// Fetch assets and bind them
    Fetch {
        /// One or more locators
        #[arg(required = true)]
        locators: Vec<String>,
        #[arg(short, long, value_enum, default_value_t = KindArg::Icon)]
        kind: KindArg,
    },

    /// Remove expired entries from both partitions
    Sweep,

    /// Remove every cached entry and the manifest
    Wipe,

    /// Print the effective settings
    ShowConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Glyph,
    Icon,
    Bundle,
}

impl From<KindArg> for AssetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Glyph => AssetKind::Glyph,
            KindArg::Icon => AssetKind::Icon,
            KindArg::Bundle => AssetKind::Bundle,
        }
    }
}

/// Stand-in presentation layer: prints what it is asked to bind.
struct LoggingHost;

impl ResourceHost for LoggingHost {
    fn register_source(&mut self, resources_dir: &Path) -> Result<()> {
        println!("{} {}", "[source]".cyan(), resources_dir.display());
        Ok(())
    }

    fn bind_resource(&mut self, file: &Path, id: &ResourceId) -> Result<()> {
        println!("{} {} -> {}", "[bound]".green(), id, file.display());
        Ok(())
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "assetpack=debug" } else { "assetpack=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let root = cli.root.unwrap_or_else(default_root);
    let settings_path = Settings::path_in(&root.join("configs"));
    let settings = Settings::load(&settings_path)?;
    let store = AssetStore::new(&root, settings.namespace.clone());

    match cli.command {
        Commands::Layout => {
            store.ensure_layout()?;
            println!("{} {}", "[✓]".green(), store.resources_dir().display());
            for partition in Partition::ALL {
                println!("    {}", store.partition_dir(partition).display());
            }
        }
        Commands::Key { locator } => {
            let key = CacheKey::from_locator(&locator);
            println!("{}", key.file_name());
        }
        Commands::Fetch { locators, kind } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            run_fetch(&runtime, &store, &settings, locators, kind.into())?;
        }
        Commands::Sweep => {
            let stats = store.sweep_expired(chrono::Utc::now(), &settings.ttls())?;
            println!(
                "{} removed {} file(s), {} bytes; kept {} file(s)",
                "[✓]".green(),
                stats.removed_files,
                stats.removed_bytes,
                stats.retained_files
            );
            if stats.failed_files > 0 {
                println!("{} {} file(s) could not be removed", "[!]".yellow(), stats.failed_files);
            }
        }
        Commands::Wipe => {
            let stats = store.wipe_all()?;
            println!(
                "{} removed {} file(s), {} bytes",
                "[✓]".green(),
                stats.removed_files,
                stats.removed_bytes
            );
        }
        Commands::ShowConfig => {
            println!("{} {}", "root:".bold(), root.display());
            println!("{} {}", "settings:".bold(), settings_path.display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

fn run_fetch(
    runtime: &tokio::runtime::Runtime,
    store: &AssetStore,
    settings: &Settings,
    locators: Vec<String>,
    kind: AssetKind,
) -> Result<()> {
    let uploader = settings
        .report_endpoint()
        .map(|endpoint| HttpReporter::new(endpoint, runtime.handle().clone()))
        .transpose()?;
    let reporter: Arc<dyn ErrorReporter> = match &uploader {
        Some(uploader) => Arc::new(uploader.clone()),
        None => Arc::new(TracingReporter),
    };

    let (queue, mut drain) = channel(reporter.clone());
    let manager = DownloadManager::from_settings(settings, store.clone(), queue, reporter)?;

    let mut host = LoggingHost;
    store.ensure_layout()?;
    store.register_with(&mut host)?;

    let outcomes = runtime.block_on(async {
        let handles: Vec<_> = locators
            .into_iter()
            .map(|locator| {
                let task = Arc::new(manager.task(locator, kind));
                (task.clone(), manager.spawn(task))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (task, handle) in handles {
            let outcome = handle.await.context("Fetch task panicked")?;
            outcomes.push((task, outcome));
        }
        Ok::<_, anyhow::Error>(outcomes)
    })?;

    for (task, outcome) in &outcomes {
        match outcome {
            FetchOutcome::Downloaded { id, .. } => {
                println!("{} {} as {}", "[↓]".green(), task.locator(), id);
            }
            FetchOutcome::Cached { id, .. } => {
                println!("{} {} as {} (cached)", "[=]".cyan(), task.locator(), id);
            }
            FetchOutcome::Failed(e) => {
                println!("{} {}: {}", "[✗]".red(), task.locator(), e);
            }
            FetchOutcome::AlreadyInFlight | FetchOutcome::Exhausted => {
                println!("{} {}: skipped", "[!]".yellow(), task.locator());
            }
        }
    }

    let stats = drain.drain(&mut host);
    tracing::debug!(executed = stats.executed, failed = stats.failed, "Drained handoff queue");

    // Uploads are cancelled once the runtime is dropped
    if let Some(uploader) = uploader {
        runtime.block_on(uploader.flush(REPORT_FLUSH_TIMEOUT));
    }

    Ok(())
}
