//! Capabilities the orchestrator consumes from the surrounding application.
//!
//! Rendering, translation and settings storage live outside this crate; these
//! traits are the only way the core reaches them.

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::{ModeAction, ModeState};

/// Severity of a user-facing notification.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotifyKind {
    Info,
    Warning,
    Error,
}

/// Fire-and-forget user notification.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, title: &str, kind: NotifyKind);
}

/// Permission a confirmation step asks the user for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PermissionKind {
    Tun,
    Service,
    Proxy,
}

/// Text shown by the confirmation step.
#[derive(Debug, Clone, Copy)]
pub struct PermissionInfo {
    pub title: &'static str,
    pub description: &'static str,
    pub details: &'static str,
    pub warning: &'static str,
}

impl PermissionKind {
    pub fn for_mode(action: ModeAction) -> Self {
        match action {
            ModeAction::SystemProxy => PermissionKind::Proxy,
            ModeAction::Tun => PermissionKind::Tun,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PermissionKind::Tun => "TUN Mode",
            PermissionKind::Service => "Service Mode",
            PermissionKind::Proxy => "System Proxy",
        }
    }

    pub fn info(self) -> PermissionInfo {
        match self {
            PermissionKind::Tun => PermissionInfo {
                title: "TUN Mode Permission Required",
                description: "TUN mode requires special network permissions to function properly.",
                details: "This will grant the core the capabilities (CAP_NET_ADMIN) needed to create and manage TUN interfaces.",
                warning: "Administrator privileges may be required for this operation.",
            },
            PermissionKind::Service => PermissionInfo {
                title: "Service Mode Permission Required",
                description: "Service mode requires access to the system service IPC socket.",
                details: "This will add your user to the service group to access the service.",
                warning: "You may need to log out and log back in for the changes to take effect.",
            },
            PermissionKind::Proxy => PermissionInfo {
                title: "System Proxy Permission Required",
                description: "System proxy requires permission to modify network settings.",
                details: "This may require administrator privileges to change system proxy settings.",
                warning: "On macOS, you may need to grant accessibility permissions in System Preferences.",
            },
        }
    }
}

/// Blocking confirmation before a privileged step. `false` means declined.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, permission: PermissionKind) -> bool;
}

/// Access to the application's mode settings.
#[async_trait]
pub trait ModeSettings: Send + Sync {
    async fn mode_state(&self) -> ModeState;

    /// Persist the service-mode preference.
    async fn set_service_mode(&self, enabled: bool) -> Result<(), ServiceError>;

    async fn is_enabled(&self, action: ModeAction) -> bool {
        self.mode_state().await.is_enabled(action)
    }
}
