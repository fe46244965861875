//! Manual installation/uninstallation guidance for when automation stalls.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::error::ServiceError;
use crate::util::program_in_path;

/// Which flow needs manual recovery.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecoveryContext {
    Install,
    Uninstall,
}

impl fmt::Display for RecoveryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryContext::Install => f.write_str("install"),
            RecoveryContext::Uninstall => f.write_str("uninstall"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }
}

/// Text handed to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryGuidance {
    pub context: RecoveryContext,
    pub title: String,
    pub summary: String,
    pub steps: Vec<String>,
}

/// Shows recovery guidance until the user dismisses it. Must not retry anything.
pub trait RecoveryPresenter: Send + Sync {
    fn present(&self, guidance: RecoveryGuidance);
}

pub struct ManualRecoveryAdvisor {
    program: String,
    service_name: String,
    platform: Platform,
    presenter: Arc<dyn RecoveryPresenter>,
}

impl ManualRecoveryAdvisor {
    pub fn new(
        program: impl Into<String>,
        service_name: impl Into<String>,
        presenter: Arc<dyn RecoveryPresenter>,
    ) -> Self {
        Self {
            program: program.into(),
            service_name: service_name.into(),
            platform: Platform::current(),
            presenter,
        }
    }

    /// Present guidance for a stalled or failed flow.
    pub fn offer(&self, context: RecoveryContext, cause: &ServiceError) {
        info!(%context, %cause, "offering manual recovery");
        let mut guidance = self.guidance(context);
        guidance.summary = if cause.is_timeout() {
            format!(
                "The {context} step did not finish in time. It may still be waiting on an administrator prompt; \
                 check for one, or {context} the service manually."
            )
        } else {
            format!("Automatic {context} failed ({cause}). Please {context} the service manually.")
        };
        self.presenter.present(guidance);
    }

    pub fn guidance(&self, context: RecoveryContext) -> RecoveryGuidance {
        let mut steps = guidance_steps(self.platform, context, &self.program, &self.service_name);
        if !program_in_path(&self.program) {
            steps.push(format!(
                "If `{}` is not on your PATH, run it from the application's installation directory.",
                self.program
            ));
        }
        RecoveryGuidance {
            context,
            title: match context {
                RecoveryContext::Install => "Manual service installation".to_string(),
                RecoveryContext::Uninstall => "Manual service removal".to_string(),
            },
            summary: format!("Follow these steps to {context} {} manually.", self.service_name),
            steps,
        }
    }
}

fn guidance_steps(
    platform: Platform,
    context: RecoveryContext,
    program: &str,
    service_name: &str,
) -> Vec<String> {
    let shell = match platform {
        Platform::Windows => "Open PowerShell as Administrator (right-click, \"Run as administrator\").",
        Platform::MacOs | Platform::Linux => "Open a terminal.",
    };
    let elevate = match platform {
        Platform::Windows => "",
        Platform::MacOs | Platform::Linux => "sudo ",
    };
    let mut steps = vec![shell.to_string()];
    match context {
        RecoveryContext::Install => {
            steps.push(format!("Run `{elevate}{program} install`."));
            steps.push(format!("Run `{elevate}{program} start`."));
            steps.push(format!(
                "Return to the application; {service_name} is detected within a few seconds."
            ));
        }
        RecoveryContext::Uninstall => {
            steps.push(format!("Run `{elevate}{program} stop`."));
            steps.push(format!("Run `{elevate}{program} uninstall`."));
            steps.push("Return to the application and refresh the service status.".to_string());
        }
    }
    steps
}
