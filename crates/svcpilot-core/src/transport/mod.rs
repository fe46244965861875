//! Transport seams: the native command channel and the local HTTP probe.

mod http;
mod process;

use async_trait::async_trait;

pub use http::LocalApiProbe;
pub use process::{NativeModeSettings, ProcessChannel};

use crate::error::TransportError;
use crate::ModeAction;

/// Commands understood by the native command channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NativeCommand {
    ServiceStatus,
    ServiceInstall,
    ServiceUninstall,
    ServiceStart,
    ServiceStop,
    ToggleSystemProxy,
    ToggleTunMode,
    ModeState,
    SetServiceMode(bool),
    RestartSidecar,
}

impl NativeCommand {
    pub fn toggle(action: ModeAction) -> Self {
        match action {
            ModeAction::SystemProxy => NativeCommand::ToggleSystemProxy,
            ModeAction::Tun => NativeCommand::ToggleTunMode,
        }
    }

    /// Command-line arguments passed to the helper program.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            NativeCommand::ServiceStatus => &["status", "--json"],
            NativeCommand::ServiceInstall => &["install"],
            NativeCommand::ServiceUninstall => &["uninstall"],
            NativeCommand::ServiceStart => &["start"],
            NativeCommand::ServiceStop => &["stop"],
            NativeCommand::ToggleSystemProxy => &["toggle-system-proxy"],
            NativeCommand::ToggleTunMode => &["toggle-tun"],
            NativeCommand::ModeState => &["mode-state", "--json"],
            NativeCommand::SetServiceMode(true) => &["service-mode", "on"],
            NativeCommand::SetServiceMode(false) => &["service-mode", "off"],
            NativeCommand::RestartSidecar => &["restart-sidecar"],
        }
    }

    pub fn is_mutation(self) -> bool {
        !matches!(self, NativeCommand::ServiceStatus | NativeCommand::ModeState)
    }
}

/// Native command channel. Returns the command's raw output on success.
#[async_trait]
pub trait NativeChannel: Send + Sync {
    async fn invoke(&self, command: NativeCommand) -> Result<String, TransportError>;
}

/// Response of a local status endpoint probe.
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub body: String,
}

impl ProbeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Best-effort HTTP probe of the local status endpoint.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn get(&self, path: &str) -> Result<ProbeResponse, TransportError>;
}
