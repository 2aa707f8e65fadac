//! chatplay binary: composition root.
//!
//! 1. Load configuration from TOML (writing defaults on first run)
//! 2. Build the action table, blocklist and authorization rules
//! 3. Pick a message source (replay file or console)
//! 4. Run the dispatch loop until exit is requested or the source ends

mod cli;
mod console;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

use chatplay_action::{
    ActionContext, ActionRegistry, ActionTable, Blocklist, ChannelSource, CommandSwitch,
    Dispatcher, FileBlocklist, MessageSource, Presentation, ReplaySource, StaticBlocklist,
};
use chatplay_core::ChatPlayConfig;

use crate::cli::CliArgs;
use crate::console::{connected_line, preamble, spawn_ctrl_c, spawn_stdin_reader, ConsolePresentation};

/// How long a replay run waits for its last tasks before exiting.
const REPLAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Expand ~ to home directory in a path string.
fn expand_home(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// `RUST_LOG` if set, else `fallback_level`, else `info`.
fn env_filter(fallback_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn init_tracing(fallback_level: &str) {
    tracing_subscriber::fmt().with_env_filter(env_filter(fallback_level)).init();
}

/// Load (or create) the configuration under a short-lived subscriber, so its
/// log lines are kept even though the final log level comes from the config.
fn load_config<W>(
    path: &Path,
    filter: EnvFilter,
    writer: W,
) -> chatplay_core::Result<(ChatPlayConfig, bool)>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let bootstrap = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish();
    tracing::subscriber::with_default(bootstrap, || ChatPlayConfig::load_or_create(path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliArgs::parse();

    // Config. Parse or validation failures are fatal.
    let config_file = cli.resolve_config_path();
    let (config, created) = load_config(
        &config_file,
        env_filter(&cli.resolve_log_level("info")),
        std::io::stdout,
    )?;

    init_tracing(&cli.resolve_log_level(&config.general.log_level));
    tracing::info!("Starting chatplay v{}", env!("CARGO_PKG_VERSION"));

    if created {
        tracing::info!(path = %config_file.display(), "Default configuration written");
    } else {
        match config.save_with_backup(&config_file) {
            Ok(Some(backup)) => tracing::debug!(backup = %backup.display(), "Previous configuration backed up"),
            Ok(None) => {}
            Err(e) => tracing::warn!(path = %config_file.display(), error = %e, "Failed to re-save configuration"),
        }
    }

    if cli.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let offline = cli.resolve_offline(config.general.offline)?;

    let presentation = Arc::new(ConsolePresentation::new());

    // Action table. Built once; only the command switch changes at runtime.
    let switch = CommandSwitch::new(config.engine.commands_enabled);
    let registry = ActionRegistry::with_defaults();
    let ctx = ActionContext::new(switch.clone())
        .with_status(Arc::clone(&presentation) as Arc<dyn Presentation>);
    let table = Arc::new(ActionTable::from_config(&config, &registry, &ctx)?);
    tracing::info!(commands = table.len(), kinds = ?registry.kinds(), "Action table ready");

    let blocklist: Arc<dyn Blocklist> = match config.access.blocklist_path.as_deref() {
        Some(path) => Arc::new(FileBlocklist::open(expand_home(path))?),
        None => Arc::new(StaticBlocklist::empty()),
    };

    presentation.status(&preamble(&config, &table));

    // Message source.
    let default_channel = config
        .channels
        .first()
        .cloned()
        .unwrap_or_else(|| "offline".to_string());
    let source: Box<dyn MessageSource> = if let Some(path) = cli.replay.as_deref() {
        Box::new(ReplaySource::from_file(path, &default_channel)?)
    } else if offline {
        presentation.status("OFFLINE MODE");
        let (tx, source) = ChannelSource::channel(64);
        spawn_stdin_reader(tx, switch.clone(), Arc::clone(&presentation), default_channel)?;
        Box::new(source)
    } else {
        return Err("No live chat connector is built in; use --offline, --replay or set general.offline = true".into());
    };

    presentation.status(&connected_line(&config));
    spawn_ctrl_c(Arc::clone(&presentation));

    let mut dispatcher = Dispatcher::from_config(
        &config,
        table,
        switch,
        blocklist,
        source,
        Arc::clone(&presentation) as Arc<dyn Presentation>,
    );
    let stats = dispatcher.run().await;

    if cli.replay.is_some() {
        if !dispatcher.drain(REPLAY_DRAIN_TIMEOUT).await {
            tracing::warn!(in_flight = dispatcher.engine().pending(), "Replay finished with tasks still running");
        }
    } else if dispatcher.engine().pending() > 0 {
        tracing::info!(in_flight = dispatcher.engine().pending(), "Exiting without waiting for running tasks");
    }

    tracing::info!(
        received = stats.received,
        submitted = stats.submitted,
        ignored = stats.ignored,
        overloaded = stats.overloaded,
        too_soon = stats.too_soon,
        "chatplay stopped"
    );
    Ok(())
}
