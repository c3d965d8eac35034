//! Fontshelf daemon.
//!
//! Keeps a library in sync with the filesystem and the OS font registry:
//! - catches up on files that changed while it was down
//! - watches sources and feeds changes through the debounced queue
//! - runs the activation drift sweep on a timer
//!
//! ## Usage
//!
//! ```bash
//! fontshelf-daemon              # Run in foreground
//! fontshelf-daemon --once       # Run startup work once and exit
//! ```

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use fontshelf::watcher::FsWatcher;
use fontshelf::{logging, Config, Library};

/// Lower bound for the drain tick so a zero debounce does not spin.
const MIN_DRAIN_TICK: Duration = Duration::from_millis(50);

struct DaemonArgs {
    /// Run startup work and exit
    once: bool,
    config_path: Option<PathBuf>,
    library_root: Option<PathBuf>,
}

fn parse_args() -> DaemonArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = DaemonArgs {
        once: false,
        config_path: None,
        library_root: None,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                parsed.once = true;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--library" | "-l" => {
                if i + 1 < args.len() {
                    parsed.library_root = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--version" | "-V" => {
                println!("fontshelf-daemon {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"fontshelf-daemon - Background sync for a Fontshelf library

USAGE:
    fontshelf-daemon [OPTIONS]

OPTIONS:
    --once, -1           Sync facets, catch up and sweep once, then exit
    --config, -c PATH    Path to config file
    --library, -l DIR    Library root (overrides library_root in config)
    --version, -V        Show version
    --help, -h           Show this help message

ENVIRONMENT:
    FONTSHELF_CONFIG    Path to config file (overrides default location)
    FONTSHELF_LOG       Log filter (trace, debug, info, warn, error)
"#
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args();

    // journald on Linux, rolling file otherwise
    let _ = logging::init(None);

    info!("Fontshelf daemon starting...");

    let mut config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(root) = args.library_root {
        config.library_root = root;
    }

    let library = Arc::new(Library::open(&config.library_root, &config)?);

    let startup = Arc::clone(&library);
    let startup_config = config.clone();
    tokio::task::spawn_blocking(move || startup_work(&startup, &startup_config))
        .await
        .context("Startup task panicked")??;

    if args.once {
        info!("Running in single-shot mode, exiting after startup work");
    } else {
        run_daemon_loop(Arc::clone(&library), &config).await?;
    }

    let library = Arc::try_unwrap(library).map_err(|_| anyhow!("Library still in use at shutdown"))?;
    library.close()?;
    info!("Fontshelf daemon stopped");
    Ok(())
}

fn startup_work(library: &Library, config: &Config) -> Result<()> {
    if let Some(schema_path) = &config.facets.schema_path {
        let report = library.sync_facet_schema_file(schema_path)?;
        info!("Facet schema {}: {:?}", schema_path.display(), report);
    }

    let (kind, result) = if config.watcher.rescan_on_startup {
        ("rescan", library.rescan_all()?)
    } else {
        ("catch-up", library.catch_up_sources()?)
    };
    info!(
        "Startup {}: {} ok, {} failed, {} missing",
        kind,
        result.scanned,
        result.failed,
        result.missing_paths.len()
    );

    // After the scan pass so the sweep sees the current file states
    if config.reconcile.sweep_on_startup {
        let report = library.reconcile_activation_state()?;
        info!("Startup sweep: {:?}", report);
    }
    Ok(())
}

async fn run_daemon_loop(library: Arc<Library>, config: &Config) -> Result<()> {
    let mut watcher = if config.watcher.enabled {
        let mut watcher = FsWatcher::new(library.change_queue())?;
        watcher.sync_roots(&library.enabled_source_roots()?);
        Some(watcher)
    } else {
        None
    };

    let drain_period = Duration::from_millis(config.watcher.debounce_ms).max(MIN_DRAIN_TICK);
    let mut drain_tick = interval_at(Instant::now() + drain_period, drain_period);
    drain_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let sweep_enabled = config.reconcile.sweep_interval_secs > 0;
    let sweep_period = Duration::from_secs(config.reconcile.sweep_interval_secs.max(1));
    let mut sweep_tick = interval_at(Instant::now() + sweep_period, sweep_period);
    sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        "Running in daemon mode: drain every {:?}, sweep {}",
        drain_period,
        if sweep_enabled {
            format!("every {:?}", sweep_period)
        } else {
            "disabled".to_string()
        }
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = drain_tick.tick() => {
                let lib = Arc::clone(&library);
                match tokio::task::spawn_blocking(move || lib.drain_changes(false)).await? {
                    Ok(Some(stats)) if stats.processed > 0 => {
                        info!("Processed {} changed path(s)", stats.processed);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Change drain failed: {}", e),
                }
            }
            _ = sweep_tick.tick(), if sweep_enabled => {
                let lib = Arc::clone(&library);
                match tokio::task::spawn_blocking(move || lib.reconcile_activation_state()).await? {
                    Ok(report) if report.registered + report.unregistered + report.failures > 0 => {
                        info!("Drift sweep: {:?}", report);
                    }
                    Ok(_) => {}
                    Err(e) => error!("Drift sweep failed: {}", e),
                }
                // Pick up sources added or removed by the command-line tool
                if let Some(watcher) = watcher.as_mut() {
                    match library.enabled_source_roots() {
                        Ok(roots) => watcher.sync_roots(&roots),
                        Err(e) => warn!("Could not refresh watched sources: {}", e),
                    }
                }
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Signal handler failed: {}", e);
                }
                info!("Shutdown requested");
                break;
            }
        }
    }

    drop(watcher);
    let lib = Arc::clone(&library);
    match tokio::task::spawn_blocking(move || lib.drain_changes(true)).await? {
        Ok(_) => {}
        Err(e) => warn!("Final drain failed: {}", e),
    }
    Ok(())
}
