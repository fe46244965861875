//! Terminal implementations of the notification, confirmation and recovery
//! capabilities.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;
use svcpilot_core::{
    Confirmer, Notifier, NotifyKind, PermissionKind, RecoveryGuidance, RecoveryPresenter,
};
use tracing::warn;

pub(super) struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, title: &str, kind: NotifyKind) {
        let tag = match kind {
            NotifyKind::Info => "info",
            NotifyKind::Warning => "warning",
            NotifyKind::Error => "error",
        };
        let mut lines = message.lines();
        eprintln!("[{tag}] {title}: {}", lines.next().unwrap_or_default());
        for line in lines {
            eprintln!("    {line}");
        }
    }
}

/// Asks on stdin. Without a terminal the answer is "no" unless `--yes` was given.
pub(super) struct StdinConfirmer {
    assume_yes: bool,
}

impl StdinConfirmer {
    pub(super) fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn confirm(&self, permission: PermissionKind) -> bool {
        let info = permission.info();
        println!("{}", info.title);
        println!("  {}", info.description);
        println!("  {}", info.details);
        println!("  {}", info.warning);
        if self.assume_yes {
            println!("Confirmed by --yes.");
            return true;
        }
        let question = match permission {
            PermissionKind::Service => "Switch service mode on now? [y/N]: ",
            PermissionKind::Tun | PermissionKind::Proxy => {
                "The service is not installed. Install it now? [y/N]: "
            }
        };
        match tokio::task::spawn_blocking(move || prompt(question)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                warn!(?err, "failed to read confirmation");
                false
            }
            Err(err) => {
                warn!(?err, "confirmation prompt task failed");
                false
            }
        }
    }
}

fn prompt(question: &str) -> io::Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }
    print!("{question}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let input = input.trim().to_ascii_lowercase();
    Ok(matches!(input.as_str(), "y" | "yes"))
}

pub(super) struct TerminalPresenter;

impl RecoveryPresenter for TerminalPresenter {
    fn present(&self, guidance: RecoveryGuidance) {
        print_guidance(&guidance);
    }
}

pub(super) fn print_guidance(guidance: &RecoveryGuidance) {
    println!();
    println!("{}", guidance.title);
    println!("{}", guidance.summary);
    for (index, step) in guidance.steps.iter().enumerate() {
        println!("  {}. {step}", index + 1);
    }
}
