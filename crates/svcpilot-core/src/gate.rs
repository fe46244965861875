//! Readiness gate in front of the system proxy, TUN and service-mode switches.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::orchestrator::LifecycleOrchestrator;
use crate::{
    Confirmer, ModeAction, ModeSettings, Notifier, NotifyKind, PermissionKind, ServiceStatus,
    StatusInfo,
};

/// Result of a gated toggle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The toggle went straight to the service.
    Toggled { action: ModeAction, enabled: bool },
    /// The service had to be installed first; the mode was enabled afterwards.
    InstalledAndEnabled(StatusInfo),
}

/// Mode switches go through the orchestrator, so they share its lifecycle
/// slot with install and uninstall.
pub struct ModeGate {
    orchestrator: Arc<LifecycleOrchestrator>,
    settings: Arc<dyn ModeSettings>,
    confirmer: Arc<dyn Confirmer>,
    notifier: Arc<dyn Notifier>,
}

impl ModeGate {
    pub fn new(
        orchestrator: Arc<LifecycleOrchestrator>,
        settings: Arc<dyn ModeSettings>,
        confirmer: Arc<dyn Confirmer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orchestrator,
            settings,
            confirmer,
            notifier,
        }
    }

    /// Flip `action`, installing the service first when it is missing.
    ///
    /// Disabling is never gated. Enabling against a missing service asks for
    /// confirmation and hands the install to the orchestrator; otherwise the
    /// toggle is issued once, without retry. Any running flow rejects the
    /// request with `Busy`.
    pub async fn request_toggle(&self, action: ModeAction) -> Result<ToggleOutcome, ServiceError> {
        self.ensure_idle()?;

        if self.settings.is_enabled(action).await {
            debug!(%action, "disabling mode");
            self.switch(action, false).await?;
            return Ok(ToggleOutcome::Toggled {
                action,
                enabled: false,
            });
        }

        let status = self.orchestrator.status().await;
        if status.status == ServiceStatus::NotInstalled {
            return self.install_then_enable(action).await;
        }

        self.switch(action, true).await?;
        info!(%action, service = %status.status, "mode enabled");
        Ok(ToggleOutcome::Toggled {
            action,
            enabled: true,
        })
    }

    /// Flip the service-mode preference. Only a running service can take it;
    /// anything else is refused with a warning and no mutation.
    pub async fn request_service_mode(&self) -> Result<bool, ServiceError> {
        self.ensure_idle()?;

        let status = self.orchestrator.status().await.status;
        if status != ServiceStatus::Running {
            let message = match status {
                ServiceStatus::NotInstalled => {
                    "Service not installed, please install the system service first"
                }
                _ => "Service not running, please start the system service first",
            };
            self.notifier.notify(message, "Service Mode", NotifyKind::Warning);
            return Err(ServiceError::ServiceNotRunning(status));
        }

        let enable = !self.settings.mode_state().await.service_mode;
        if enable && !self.confirmer.confirm(PermissionKind::Service).await {
            info!("service mode declined");
            return Err(ServiceError::GateBlocked(PermissionKind::Service));
        }
        if let Err(err) = self.settings.set_service_mode(enable).await {
            self.notifier
                .notify(&format!("Failed to switch service mode\n{err}"), "Error", NotifyKind::Error);
            return Err(err);
        }
        info!(enable, "service mode switched");
        Ok(enable)
    }

    fn ensure_idle(&self) -> Result<(), ServiceError> {
        let progress = self.orchestrator.progress();
        if progress.is_busy() {
            debug!(stage = progress.stage_label(), "switch rejected while a flow runs");
            return Err(ServiceError::Busy);
        }
        Ok(())
    }

    async fn install_then_enable(&self, action: ModeAction) -> Result<ToggleOutcome, ServiceError> {
        info!(%action, "service not installed; asking for confirmation");
        let permission = PermissionKind::for_mode(action);
        if !self.confirmer.confirm(permission).await {
            info!(%action, "install declined");
            return Err(ServiceError::GateBlocked(permission));
        }
        let status = self.orchestrator.request_install(Some(action)).await?;
        Ok(ToggleOutcome::InstalledAndEnabled(status))
    }

    async fn switch(&self, action: ModeAction, enable: bool) -> Result<(), ServiceError> {
        let result = self.orchestrator.set_mode(action, enable).await;
        match &result {
            Err(ServiceError::Busy) => debug!(%action, "flow started before the switch"),
            Err(err) => {
                warn!(%action, %err, "mode toggle failed");
                self.notifier.notify(
                    &format!("Activation {} failed!\nError: {err}", action.label()),
                    "Error",
                    NotifyKind::Error,
                );
            }
            Ok(()) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::orchestrator::Stage;
    use crate::test_support::Harness;
    use crate::transport::NativeCommand;
    use crate::{ModeState, Operation};

    #[tokio::test(start_paused = true)]
    async fn missing_service_confirms_before_any_mutation() {
        let harness = Harness::new();
        harness.confirmer.answer(false);
        harness.cache.refetch().await;

        let err = harness
            .gate
            .request_toggle(ModeAction::SystemProxy)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::GateBlocked(PermissionKind::Proxy)));
        assert_eq!(harness.confirmer.asked(), vec![PermissionKind::Proxy]);
        assert_eq!(harness.confirmer.mutations_seen(), vec![0]);
        assert!(harness.channel.mutation_log().is_empty());
        assert_eq!(
            harness.orchestrator.refresh_status().await.status,
            ServiceStatus::NotInstalled
        );
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_install_enables_requested_mode() {
        let harness = Harness::new();
        harness.confirmer.answer(true);

        let outcome = harness
            .gate
            .request_toggle(ModeAction::SystemProxy)
            .await
            .expect("toggle");

        let info = match outcome {
            ToggleOutcome::InstalledAndEnabled(info) => info,
            other => panic!("expected install flow, got {other:?}"),
        };
        assert_eq!(info.status, ServiceStatus::Running);
        assert!(harness.channel.mode_state().system_proxy);
        assert_eq!(harness.channel.calls(NativeCommand::ServiceInstall), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_service_toggles_directly() {
        let harness = Harness::with_status(ServiceStatus::Stopped);

        let outcome = harness
            .gate
            .request_toggle(ModeAction::Tun)
            .await
            .expect("toggle");

        assert_eq!(
            outcome,
            ToggleOutcome::Toggled {
                action: ModeAction::Tun,
                enabled: true
            }
        );
        assert!(harness.confirmer.asked().is_empty());
        assert_eq!(harness.channel.mutation_log(), vec![NativeCommand::ToggleTunMode]);
        assert_eq!(
            harness.orchestrator.status().await.status,
            ServiceStatus::Running
        );
        assert!(harness.channel.mode_state().tun);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_is_never_gated() {
        let harness = Harness::new();
        harness.channel.set_mode_state(ModeState {
            system_proxy: true,
            ..ModeState::default()
        });

        let outcome = harness
            .gate
            .request_toggle(ModeAction::SystemProxy)
            .await
            .expect("toggle");

        assert_eq!(
            outcome,
            ToggleOutcome::Toggled {
                action: ModeAction::SystemProxy,
                enabled: false
            }
        );
        assert!(harness.confirmer.asked().is_empty());
        assert!(!harness.channel.mode_state().system_proxy);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_error_is_reported_without_retry() {
        let harness = Harness::with_status(ServiceStatus::Running);
        harness
            .channel
            .fail_command(NativeCommand::ToggleTunMode, "tun device busy");

        let err = harness
            .gate
            .request_toggle(ModeAction::Tun)
            .await
            .unwrap_err();

        assert_eq!(err.operation(), Some(Operation::Toggle(ModeAction::Tun)));
        assert_eq!(harness.channel.calls(NativeCommand::ToggleTunMode), 1);
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].0.starts_with("Activation TUN Mode failed!"));
        assert!(messages[0].0.contains("tun device busy"));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_while_install_enables_the_mode_is_rejected() {
        let harness = Harness::new();
        harness
            .channel
            .delay_command(NativeCommand::ToggleTunMode, Duration::from_secs(2));
        let orchestrator = harness.orchestrator.clone();
        let flow = tokio::spawn(async move { orchestrator.request_install(Some(ModeAction::Tun)).await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            harness.orchestrator.progress().stage,
            Stage::EnablingMode(ModeAction::Tun)
        );
        let err = harness.gate.request_toggle(ModeAction::Tun).await.unwrap_err();
        assert!(matches!(err, ServiceError::Busy));

        flow.await.expect("join").expect("install");
        assert_eq!(harness.channel.calls(NativeCommand::ToggleTunMode), 1);
        assert!(harness.channel.mode_state().tun);
        assert!(harness.notifier.messages().iter().all(|(_, _, kind)| *kind != NotifyKind::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_while_uninstalling_is_rejected() {
        let harness = Harness::with_status(ServiceStatus::Stopped);
        harness
            .channel
            .delay_command(NativeCommand::ServiceUninstall, Duration::from_secs(2));
        let orchestrator = harness.orchestrator.clone();
        let flow = tokio::spawn(async move { orchestrator.request_uninstall().await });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(harness.orchestrator.progress().stage, Stage::Uninstalling);
        let err = harness
            .gate
            .request_toggle(ModeAction::SystemProxy)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Busy));

        flow.await.expect("join").expect("uninstall");
        assert_eq!(
            harness.channel.mutation_log(),
            vec![NativeCommand::ServiceUninstall, NativeCommand::RestartSidecar]
        );
        assert!(!harness.channel.mode_state().system_proxy);
    }

    #[tokio::test(start_paused = true)]
    async fn disabling_last_mode_stops_running_service() {
        let harness = Harness::with_status(ServiceStatus::Running);
        harness.channel.set_mode_state(ModeState {
            tun: true,
            ..ModeState::default()
        });

        harness
            .gate
            .request_toggle(ModeAction::Tun)
            .await
            .expect("toggle");

        assert_eq!(harness.channel.status(), ServiceStatus::Stopped);
        assert_eq!(harness.channel.calls(NativeCommand::ServiceStop), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn service_keeps_running_while_another_mode_uses_it() {
        let harness = Harness::with_status(ServiceStatus::Running);
        harness.channel.set_mode_state(ModeState {
            system_proxy: true,
            tun: true,
            ..ModeState::default()
        });

        harness
            .gate
            .request_toggle(ModeAction::Tun)
            .await
            .expect("toggle");

        assert_eq!(harness.channel.status(), ServiceStatus::Running);
        assert_eq!(harness.channel.calls(NativeCommand::ServiceStop), 0);
        assert!(harness.channel.mode_state().system_proxy);
    }

    #[tokio::test(start_paused = true)]
    async fn service_mode_requires_running_service() {
        let harness = Harness::with_status(ServiceStatus::Stopped);

        let err = harness.gate.request_service_mode().await.unwrap_err();

        assert!(matches!(err, ServiceError::ServiceNotRunning(ServiceStatus::Stopped)));
        assert!(harness.channel.mutation_log().is_empty());
        assert!(harness.confirmer.asked().is_empty());
        let messages = harness.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].1, "Service Mode");
        assert_eq!(messages[0].2, NotifyKind::Warning);
        assert!(messages[0].0.contains("please start the system service"));

        let missing = Harness::new();
        let err = missing.gate.request_service_mode().await.unwrap_err();
        assert!(matches!(err, ServiceError::ServiceNotRunning(ServiceStatus::NotInstalled)));
        assert!(missing.notifier.messages()[0].0.contains("please install the system service"));
    }

    #[tokio::test(start_paused = true)]
    async fn service_mode_switches_on_running_service() {
        let harness = Harness::with_status(ServiceStatus::Running);
        harness.confirmer.answer(true);

        assert!(harness.gate.request_service_mode().await.expect("enable"));
        assert!(harness.channel.mode_state().service_mode);
        assert_eq!(harness.confirmer.asked(), vec![PermissionKind::Service]);

        assert!(!harness.gate.request_service_mode().await.expect("disable"));
        assert!(!harness.channel.mode_state().service_mode);
        assert_eq!(harness.confirmer.asked().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_service_mode_changes_nothing() {
        let harness = Harness::with_status(ServiceStatus::Running);
        harness.confirmer.answer(false);

        let err = harness.gate.request_service_mode().await.unwrap_err();

        assert!(matches!(err, ServiceError::GateBlocked(PermissionKind::Service)));
        assert!(harness.channel.mutation_log().is_empty());
    }
}
