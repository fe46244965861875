//! Service status and mode data model shared by every component.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Installation/run state of the helper service.
///
/// Variant order is the readiness order: `NotInstalled < Stopped < Running`.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    NotInstalled,
    Stopped,
    Running,
}

impl ServiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::NotInstalled => "not_installed",
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Running => "running",
        }
    }

    pub fn is_installed(self) -> bool {
        self != ServiceStatus::NotInstalled
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized status report produced by a status source.
///
/// Never mutated after construction; every refresh replaces the cached value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub status: ServiceStatus,
    #[serde(default, rename = "server", alias = "server_endpoint")]
    pub server_endpoint: Option<String>,
}

impl StatusInfo {
    /// Fallback used whenever the service cannot be reached.
    pub fn not_installed() -> Self {
        Self {
            name: String::new(),
            version: String::new(),
            status: ServiceStatus::NotInstalled,
            server_endpoint: None,
        }
    }
}

/// Feature toggles that depend on the service being available.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModeAction {
    SystemProxy,
    Tun,
}

impl ModeAction {
    pub const ALL: [ModeAction; 2] = [ModeAction::SystemProxy, ModeAction::Tun];

    pub fn label(self) -> &'static str {
        match self {
            ModeAction::SystemProxy => "System Proxy",
            ModeAction::Tun => "TUN Mode",
        }
    }
}

impl fmt::Display for ModeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mode requested alongside an install; lives only for one install flow.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PendingInstall {
    pub requested_mode: Option<ModeAction>,
}

/// Current enablement of the dependent modes as reported by settings.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeState {
    #[serde(default)]
    pub system_proxy: bool,
    #[serde(default)]
    pub tun: bool,
    /// Core runs through the installed service instead of as a child process.
    #[serde(default)]
    pub service_mode: bool,
}

impl ModeState {
    pub fn is_enabled(&self, action: ModeAction) -> bool {
        match action {
            ModeAction::SystemProxy => self.system_proxy,
            ModeAction::Tun => self.tun,
        }
    }
}

/// User-facing service actions a front end can offer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServiceAction {
    Install,
    Uninstall,
    Start,
    Stop,
}

impl ServiceAction {
    pub fn label(self) -> &'static str {
        match self {
            ServiceAction::Install => "install",
            ServiceAction::Uninstall => "uninstall",
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
        }
    }
}

/// Actions that make sense for the given status.
pub fn available_actions(status: ServiceStatus) -> &'static [ServiceAction] {
    match status {
        ServiceStatus::NotInstalled => &[ServiceAction::Install],
        ServiceStatus::Stopped => &[ServiceAction::Start, ServiceAction::Uninstall],
        ServiceStatus::Running => &[ServiceAction::Stop],
    }
}
