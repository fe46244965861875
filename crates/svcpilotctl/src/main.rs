//! Command-line front end for the helper service lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use svcpilot_core::status_source::for_context;
use svcpilot_core::util;
use svcpilot_core::transport::{NativeModeSettings, ProcessChannel};
use svcpilot_core::{
    available_actions, program_in_path, CachedStatus, Config, FlowProgress, LifecycleOrchestrator,
    ManualRecoveryAdvisor, ModeAction, ModeGate, MutationExecutor, RecoveryContext, RunContext,
    StatusCache, StatusInfo, ToggleOutcome,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[path = "runtime_config.rs"]
mod runtime_config;
#[path = "interrupt.rs"]
mod interrupt;
#[path = "terminal.rs"]
mod terminal;

use crate::runtime_config::{config_source, init_tracing, load_config};
use crate::interrupt::{interrupted, Interrupt};
use crate::terminal::{print_guidance, StdinConfirmer, TerminalNotifier, TerminalPresenter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the current service status
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Force a fresh status read
    Refresh,
    /// Install the service, optionally enabling a mode afterwards
    Install {
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Disable active modes and uninstall the service
    Uninstall,
    Start,
    Stop,
    /// Toggle a mode, installing the service first if needed
    Toggle {
        #[arg(value_enum)]
        mode: ModeArg,
        /// Skip the install confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Switch service mode on or off; needs a running service
    ServiceMode {
        /// Skip the permission prompt
        #[arg(long)]
        yes: bool,
    },
    /// Follow status changes until interrupted
    Watch,
    /// Print manual installation or removal steps
    Guide {
        #[arg(value_enum)]
        context: GuideArg,
    },
    /// Validate configuration and exit
    Check,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ModeArg {
    Proxy,
    Tun,
}

impl From<ModeArg> for ModeAction {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Proxy => ModeAction::SystemProxy,
            ModeArg::Tun => ModeAction::Tun,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum GuideArg {
    Install,
    Uninstall,
}

/// Wired core components for one invocation.
struct Core {
    context: RunContext,
    cache: Arc<StatusCache>,
    orchestrator: Arc<LifecycleOrchestrator>,
    gate: ModeGate,
}

fn build_core(config: &Config, assume_yes: bool) -> Result<Core> {
    let context = RunContext::resolve(config.status.context);
    let channel = Arc::new(ProcessChannel::new(config.service.program.clone()));
    let source = for_context(context, config, channel.clone()).context("build status source")?;
    let cache = StatusCache::new(source);
    let executor = MutationExecutor::new(channel.clone(), cache.clone());
    let settings = Arc::new(NativeModeSettings::new(channel));
    let notifier = Arc::new(TerminalNotifier);
    let advisor = ManualRecoveryAdvisor::new(
        config.service.program.clone(),
        config.service.name.clone(),
        Arc::new(TerminalPresenter),
    );

    let orchestrator = Arc::new(LifecycleOrchestrator::new(
        executor,
        cache.clone(),
        settings.clone(),
        notifier.clone(),
        advisor,
        config.timeouts.clone(),
        config.verify.clone(),
    ));
    let gate = ModeGate::new(
        orchestrator.clone(),
        settings,
        Arc::new(StdinConfirmer::new(assume_yes)),
        notifier,
    );
    Ok(Core {
        context,
        cache,
        orchestrator,
        gate,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args).context("load config")?;

    init_tracing(&config);
    info!(config_source = config_source(&args), "configuration loaded");
    if util::diagnostic_mode() {
        info!(limit = util::log_limit(), "diagnostic mode: wider helper output excerpts");
    }

    let assume_yes = matches!(
        args.command,
        Command::Toggle { yes: true, .. } | Command::ServiceMode { yes: true }
    );
    let core = build_core(&config, assume_yes)?;

    match args.command {
        Command::Status { json } => {
            let status = core.orchestrator.status().await;
            print_status(&status, json)?;
            if !json {
                if let Some(snapshot) = core.cache.snapshot() {
                    println!("fetched at: {}", snapshot.fetched_at.to_rfc3339());
                }
                let actions: Vec<&str> = available_actions(status.status)
                    .iter()
                    .map(|action| action.label())
                    .collect();
                println!("available actions: {}", actions.join(", "));
            }
        }
        Command::Refresh => {
            let status = core.orchestrator.refresh_status().await;
            print_status(&status, false)?;
        }
        Command::Install { mode } => {
            let status = run_flow(&core.orchestrator, {
                let orchestrator = core.orchestrator.clone();
                async move { orchestrator.request_install(mode.map(ModeAction::from)).await }
            })
            .await?;
            print_status(&status, false)?;
        }
        Command::Uninstall => {
            let status = run_flow(&core.orchestrator, {
                let orchestrator = core.orchestrator.clone();
                async move { orchestrator.request_uninstall().await }
            })
            .await?;
            print_status(&status, false)?;
        }
        Command::Start => {
            let status = core.orchestrator.request_start().await?;
            print_status(&status, false)?;
        }
        Command::Stop => {
            let status = core.orchestrator.request_stop().await?;
            print_status(&status, false)?;
        }
        Command::Toggle { mode, .. } => {
            let action = ModeAction::from(mode);
            let progress = spawn_progress_printer(core.orchestrator.subscribe());
            let outcome = core.gate.request_toggle(action).await;
            progress.abort();
            match outcome? {
                ToggleOutcome::Toggled { action, enabled } => {
                    let state = if enabled { "enabled" } else { "disabled" };
                    println!("{action} {state}");
                }
                ToggleOutcome::InstalledAndEnabled(status) => {
                    println!("service installed; {action} enabled");
                    print_status(&status, false)?;
                }
            }
        }
        Command::ServiceMode { .. } => {
            let enabled = core.gate.request_service_mode().await?;
            println!("service mode {}", if enabled { "enabled" } else { "disabled" });
        }
        Command::Watch => watch_status(&core, &config).await,
        Command::Guide { context } => {
            let context = match context {
                GuideArg::Install => RecoveryContext::Install,
                GuideArg::Uninstall => RecoveryContext::Uninstall,
            };
            let advisor = ManualRecoveryAdvisor::new(
                config.service.program.clone(),
                config.service.name.clone(),
                Arc::new(TerminalPresenter),
            );
            print_guidance(&advisor.guidance(context));
        }
        Command::Check => {
            println!("configuration ok");
            println!("context: {:?}", core.context);
            let found = program_in_path(&config.service.program);
            println!(
                "helper program: {} ({})",
                config.service.program,
                if found { "found" } else { "not found on PATH" }
            );
        }
    }

    Ok(())
}

/// Drive a lifecycle flow, printing stage changes. Ctrl-C abandons the
/// install wait when the current stage allows it.
async fn run_flow<F>(orchestrator: &Arc<LifecycleOrchestrator>, flow: F) -> Result<StatusInfo>
where
    F: std::future::Future<Output = Result<StatusInfo, svcpilot_core::ServiceError>>
        + Send
        + 'static,
{
    let progress = spawn_progress_printer(orchestrator.subscribe());
    let mut flow = tokio::spawn(flow);
    let result = loop {
        tokio::select! {
            joined = &mut flow => break joined.context("join lifecycle flow")?,
            signal = interrupted() => {
                info!(?signal, stage = orchestrator.progress().stage_label(), "interrupt received");
                if orchestrator.cancel() {
                    eprintln!("cancelling; the privileged call may still finish in the background");
                } else {
                    warn!("current stage cannot be cancelled; waiting for it to finish");
                }
            }
        }
    };
    progress.abort();
    Ok(result?)
}

fn spawn_progress_printer(mut progress: watch::Receiver<FlowProgress>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = None;
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            if !current.is_busy() || last == Some(current.stage) {
                continue;
            }
            last = Some(current.stage);
            let cancel_hint = if current.can_cancel() { " (Ctrl-C to cancel)" } else { "" };
            eprintln!("... {}{cancel_hint}", current.stage_label());
        }
    })
}

async fn watch_status(core: &Core, config: &Config) {
    let mut updates = core.cache.subscribe();
    let poller = core.cache.spawn_poller(config.status.poll_interval());
    info!(interval_ms = config.status.poll_interval_ms, "watching service status");

    let mut last = None;
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot: Option<CachedStatus> = updates.borrow_and_update().clone();
                let Some(snapshot) = snapshot else {
                    continue;
                };
                if last == Some(snapshot.info.status) {
                    continue;
                }
                last = Some(snapshot.info.status);
                println!(
                    "{} {}",
                    snapshot.fetched_at.format("%Y-%m-%d %H:%M:%S"),
                    describe(&snapshot.info)
                );
            }
            signal = interrupted() => {
                if signal == Interrupt::Terminate {
                    info!("terminated; stopping status watch");
                }
                break;
            }
        }
    }
    poller.abort();
}

fn print_status(status: &StatusInfo, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(status).context("encode status")?);
    } else {
        println!("{}", describe(status));
    }
    Ok(())
}

fn describe(status: &StatusInfo) -> String {
    let mut line = format!("status: {}", status.status);
    if !status.name.is_empty() {
        line.push_str(&format!(", name: {}", status.name));
    }
    if !status.version.is_empty() {
        line.push_str(&format!(", version: {}", status.version));
    }
    if let Some(server) = &status.server_endpoint {
        line.push_str(&format!(", server: {server}"));
    }
    line
}
