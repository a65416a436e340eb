//! Keyswap agent entry point.
//!
//! `keyswap run` (the default) starts the remapper: it loads the config and
//! rules, installs the event tap once Accessibility access is granted, and
//! runs until Ctrl-C.  The other subcommands edit the rule file and exit; a
//! running agent picks up their changes within a couple of seconds.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load config + rules.json       -- RuleStore (publishes enabled snapshot)
//!  └─ run_agent()
//!       ├─ EventPipeline             -- reads snapshot + frontmost app
//!       ├─ PermissionMonitor         (Tokio task, starts/stops the tap)
//!       │    └─ event tap thread     (CFRunLoop, calls the pipeline inline)
//!       ├─ rules file watcher        (Tokio task)
//!       └─ main thread               -- NSWorkspace activation notifications
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keyswap_agent::application::app_context::AppContextTracker;
use keyswap_agent::application::handle_event::EventPipeline;
use keyswap_agent::application::permission_watch::PermissionMonitor;
use keyswap_agent::infrastructure::app_activation;
use keyswap_agent::infrastructure::input_capture::{platform_tap, PlatformEventFactory};
use keyswap_agent::infrastructure::permission::{request_access, PlatformProbe};
use keyswap_agent::infrastructure::storage::config::{config_file_path, load_config, AppConfig};
use keyswap_agent::infrastructure::storage::rules_file::JsonRulesFile;
use keyswap_agent::infrastructure::ui_bridge::{
    self, AgentHandles, AppState, CommandResult, RuleInputDto, RuleTargetDto,
};
use keyswap_core::AppFilterMode;

/// How often a running agent checks the rules file for outside edits.
const RULES_RELOAD_INTERVAL: Duration = Duration::from_secs(2);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// System-wide keyboard remapping for macOS.
#[derive(Debug, Parser)]
#[command(name = "keyswap", about = "System-wide keyboard remapping for macOS", version)]
struct Cli {
    /// Path to `config.toml`.  Defaults to the platform config directory.
    #[arg(long, global = true, env = "KEYSWAP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the remapper (default).
    Run,
    /// List rules in match order.
    Rules,
    /// List the named actions `add-action` accepts.
    Catalog,
    /// Enable or disable a rule.
    Toggle { id: String },
    /// Delete a rule.
    Remove { id: String },
    /// Move a rule to a new position (0 = first match).
    Move { id: String, index: usize },
    /// Remap one key to another, e.g. `add-swap "Caps Lock" Escape`.
    AddSwap {
        from: String,
        /// Target key, or `discard` to block the source key.
        to: String,
        #[command(flatten)]
        filter: AppFilterArgs,
    },
    /// Bind a key to a named action, e.g. `add-action Home line_start`.
    AddAction {
        from: String,
        action: String,
        #[command(flatten)]
        filter: AppFilterArgs,
    },
    /// Show Accessibility trust and rule counts.
    Status,
}

#[derive(Debug, clap::Args)]
struct AppFilterArgs {
    /// Only apply in these apps (bundle ids).  Repeatable.
    #[arg(long = "only", value_name = "BUNDLE_ID", conflicts_with = "except")]
    only: Vec<String>,
    /// Apply everywhere except these apps (bundle ids).  Repeatable.
    #[arg(long = "except", value_name = "BUNDLE_ID")]
    except: Vec<String>,
}

impl AppFilterArgs {
    fn into_filter(self) -> (AppFilterMode, Vec<String>) {
        if !self.only.is_empty() {
            (AppFilterMode::Include, self.only)
        } else if !self.except.is_empty() {
            (AppFilterMode::Exclude, self.except)
        } else {
            (AppFilterMode::All, Vec::new())
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.agent.log_level)),
        )
        .init();

    let base_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let rules_file = JsonRulesFile::new(config.storage.rules_path(&base_dir));
    let report = rules_file
        .load_or_recover()
        .with_context(|| format!("failed to read {}", rules_file.path().display()))?;
    info!(
        path = %rules_file.path().display(),
        loaded = report.rules.len(),
        dropped = report.dropped,
        "rules loaded"
    );

    let state = AppState::open(
        rules_file.clone(),
        report.rules,
        Box::new(PlatformProbe::default()),
    );

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_agent(state, &config, rules_file),
        Command::Rules => print_rules(&state),
        Command::Catalog => {
            let catalog = into_data(ui_bridge::list_catalog())?;
            for entry in catalog.entries {
                println!(
                    "{:<24} {:<28} {:<10} {}",
                    entry.id, entry.name, entry.category, entry.shortcut
                );
            }
            Ok(())
        }
        Command::Toggle { id } => {
            let enabled = into_data(ui_bridge::toggle_rule(&state, &id))?;
            println!("{id} {}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
        Command::Remove { id } => {
            let removed = into_data(ui_bridge::delete_rule(&state, &id))?;
            println!("removed {}", removed.summary);
            Ok(())
        }
        Command::Move { id, index } => {
            into_data(ui_bridge::move_rule(&state, &id, index))?;
            print_rules(&state)
        }
        Command::AddSwap { from, to, filter } => {
            let target = if to.eq_ignore_ascii_case("discard") {
                RuleTargetDto::Discard
            } else {
                RuleTargetDto::Key {
                    key: to,
                    modifiers: None,
                }
            };
            add_rule(&state, from, target, filter)
        }
        Command::AddAction {
            from,
            action,
            filter,
        } => add_rule(&state, from, RuleTargetDto::Action { action_id: action }, filter),
        Command::Status => {
            let status = into_data(ui_bridge::get_status(&state))?;
            println!(
                "accessibility: {}",
                if status.trusted { "granted" } else { "not granted" }
            );
            println!(
                "rules: {} ({} enabled)",
                status.rule_count, status.enabled_rule_count
            );
            Ok(())
        }
    }
}

// ── Agent ─────────────────────────────────────────────────────────────────────

fn run_agent(state: AppState, config: &AppConfig, rules_file: JsonRulesFile) -> anyhow::Result<()> {
    info!("Keyswap agent starting");

    if config.agent.prompt_for_permission && !request_access() {
        info!("waiting for Accessibility access (System Settings → Privacy & Security)");
    }

    let app_context = Arc::new(AppContextTracker::new());
    let pipeline = Arc::new(EventPipeline::new(
        state.rules.snapshot_handle(),
        Arc::clone(&app_context),
        PlatformEventFactory::default(),
    ));
    let tap = platform_tap(Arc::clone(&pipeline));
    let monitor = Arc::new(PermissionMonitor::new(
        PlatformProbe::default(),
        tap,
        config.permission.intervals(),
    ));
    let state = Arc::new(state.with_agent(AgentHandles {
        pipeline: pipeline.clone(),
        permission: monitor.clone(),
    }));

    // Registers on the main thread's run loop.
    app_activation::observe(Arc::clone(&app_context))
        .context("failed to watch the frontmost application")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("keyswap-worker")
        .build()
        .context("failed to start the async runtime")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let stop_main = Arc::new(AtomicBool::new(false));

    // ── Permission monitor ────────────────────────────────────────────────────
    let monitor_task = {
        let monitor = Arc::clone(&monitor);
        runtime.spawn(async move { monitor.run(shutdown_rx).await })
    };

    // ── Rule change log + outside edits ───────────────────────────────────────
    {
        let state = Arc::clone(&state);
        let mut revisions = state.rules.subscribe();
        runtime.spawn(async move {
            while revisions.changed().await.is_ok() {
                let revision = *revisions.borrow_and_update();
                info!(
                    revision,
                    enabled = state.rules.enabled_snapshot().len(),
                    "active rule set updated"
                );
            }
        });
    }
    runtime.spawn(watch_rules_file(Arc::clone(&state), rules_file));

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    {
        let stop_main = Arc::clone(&stop_main);
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
            let _ = shutdown_tx.send(true);
            stop_main.store(true, Ordering::Release);
        });
    }

    info!("Keyswap agent ready.  Press Ctrl-C to exit.");
    app_activation::pump_main_thread(&stop_main);

    runtime
        .block_on(monitor_task)
        .context("permission monitor task failed")?;
    runtime.shutdown_timeout(Duration::from_secs(1));

    info!(stats = ?pipeline.stats(), "Keyswap agent stopped");
    Ok(())
}

/// Reloads the rule list whenever the file changes on disk, so CLI edits
/// made while the agent runs take effect.
async fn watch_rules_file(state: Arc<AppState>, rules_file: JsonRulesFile) {
    let mut last_seen: Option<SystemTime> = rules_file.modified();
    let mut ticker = tokio::time::interval(RULES_RELOAD_INTERVAL);
    loop {
        ticker.tick().await;
        let modified = rules_file.modified();
        if modified == last_seen {
            continue;
        }
        last_seen = modified;
        if let Err(e) = rules_file.reload_into(&state.rules) {
            warn!("could not reload rules: {e}");
        }
    }
}

// ── CLI helpers ───────────────────────────────────────────────────────────────

fn into_data<T: Serialize>(result: CommandResult<T>) -> anyhow::Result<T> {
    match (result.success, result.data) {
        (true, Some(data)) => Ok(data),
        _ => bail!(result.error.unwrap_or_else(|| "command failed".to_string())),
    }
}

fn add_rule(
    state: &AppState,
    from: String,
    target: RuleTargetDto,
    filter: AppFilterArgs,
) -> anyhow::Result<()> {
    let (app_filter_mode, filtered_apps) = filter.into_filter();
    let input = RuleInputDto {
        source_key: from,
        source_modifiers: None,
        target,
        app_filter_mode,
        filtered_apps,
        is_enabled: None,
    };
    let rule = into_data(ui_bridge::add_rule(state, input))?;
    println!("added {}  {}", rule.id, rule.summary);
    Ok(())
}

fn print_rules(state: &AppState) -> anyhow::Result<()> {
    let rules = into_data(ui_bridge::list_rules(state))?;
    if rules.is_empty() {
        println!("no rules");
    }
    for (index, rule) in rules.iter().enumerate() {
        let apps = match rule.app_filter_mode {
            AppFilterMode::All => String::new(),
            AppFilterMode::Include => format!("  only in {}", rule.filtered_apps.join(", ")),
            AppFilterMode::Exclude => format!("  except in {}", rule.filtered_apps.join(", ")),
        };
        println!(
            "{index:>3}  [{}]  {}  {}{apps}",
            if rule.is_enabled { "on " } else { "off" },
            rule.id,
            rule.summary
        );
    }
    Ok(())
}
