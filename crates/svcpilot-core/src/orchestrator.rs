//! Lifecycle orchestration: install, verify, start-for-mode and uninstall.
//!
//! Flows run strictly step by step. A single slot guards every service flow
//! and every mode switch; a second request while one is in flight is rejected
//! with `Busy` instead of interleaving privileged calls. Every flow ends at `Idle` with a forced
//! status refresh, whatever the outcome.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::advisor::{ManualRecoveryAdvisor, RecoveryContext};
use crate::error::{Operation, ServiceError};
use crate::executor::MutationExecutor;
use crate::status_cache::StatusCache;
use crate::timeout::with_timeout;
use crate::{
    ModeAction, ModeSettings, Notifier, NotifyKind, PendingInstall, ServiceStatus, StatusInfo,
    TimeoutConfig, VerifyConfig,
};

/// Orchestrator stage, observable by front ends.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Installing,
    VerifyingInstall { attempt: u32 },
    StartingForMode(ModeAction),
    EnablingMode(ModeAction),
    DisablingModes,
    Uninstalling,
    Starting,
    Stopping,
    SwitchingMode(ModeAction),
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Installing => "installing service",
            Stage::VerifyingInstall { .. } => "verifying installation",
            Stage::StartingForMode(_) => "starting service",
            Stage::EnablingMode(ModeAction::SystemProxy) => "enabling system proxy",
            Stage::EnablingMode(ModeAction::Tun) => "enabling TUN mode",
            Stage::DisablingModes => "disabling proxy modes",
            Stage::Uninstalling => "uninstalling service",
            Stage::Starting => "starting service",
            Stage::Stopping => "stopping service",
            Stage::SwitchingMode(ModeAction::SystemProxy) => "switching system proxy",
            Stage::SwitchingMode(ModeAction::Tun) => "switching TUN mode",
        }
    }

    /// Only the install wait may be abandoned by the user.
    pub fn can_cancel(self) -> bool {
        matches!(self, Stage::Installing | Stage::VerifyingInstall { .. })
    }
}

/// Snapshot of the orchestrator state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlowProgress {
    pub stage: Stage,
    pub pending: Option<PendingInstall>,
}

impl FlowProgress {
    fn idle() -> Self {
        Self {
            stage: Stage::Idle,
            pending: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.stage != Stage::Idle
    }

    pub fn stage_label(&self) -> &'static str {
        self.stage.label()
    }

    pub fn can_cancel(&self) -> bool {
        self.stage.can_cancel()
    }

    pub fn pending_mode(&self) -> Option<ModeAction> {
        self.pending.and_then(|pending| pending.requested_mode)
    }
}

/// Held for the duration of one flow. Dropping it returns the state to idle
/// and clears any pending install, even when the flow future is dropped.
struct FlowGuard<'a> {
    _slot: OwnedMutexGuard<()>,
    state: &'a watch::Sender<FlowProgress>,
}

impl Drop for FlowGuard<'_> {
    fn drop(&mut self) {
        self.state.send_replace(FlowProgress::idle());
    }
}

pub struct LifecycleOrchestrator {
    executor: MutationExecutor,
    cache: Arc<StatusCache>,
    settings: Arc<dyn ModeSettings>,
    notifier: Arc<dyn Notifier>,
    advisor: ManualRecoveryAdvisor,
    timeouts: TimeoutConfig,
    verify: VerifyConfig,
    slot: Arc<Mutex<()>>,
    state: watch::Sender<FlowProgress>,
    cancel: watch::Sender<bool>,
}

impl LifecycleOrchestrator {
    pub fn new(
        executor: MutationExecutor,
        cache: Arc<StatusCache>,
        settings: Arc<dyn ModeSettings>,
        notifier: Arc<dyn Notifier>,
        advisor: ManualRecoveryAdvisor,
        timeouts: TimeoutConfig,
        verify: VerifyConfig,
    ) -> Self {
        let (state, _) = watch::channel(FlowProgress::idle());
        let (cancel, _) = watch::channel(false);
        Self {
            executor,
            cache,
            settings,
            notifier,
            advisor,
            timeouts,
            verify,
            slot: Arc::new(Mutex::new(())),
            state,
            cancel,
        }
    }

    pub fn progress(&self) -> FlowProgress {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowProgress> {
        self.state.subscribe()
    }

    /// Cached status, refreshing only when stale.
    pub async fn status(&self) -> StatusInfo {
        self.cache.get().await
    }

    /// Forced status refresh.
    pub async fn refresh_status(&self) -> StatusInfo {
        self.cache.refetch().await
    }

    /// Abandon the install wait. Returns false when nothing cancellable runs.
    ///
    /// The privileged call itself keeps running; only the flow stops waiting.
    pub fn cancel(&self) -> bool {
        if !self.progress().can_cancel() {
            return false;
        }
        info!("install wait cancelled by user");
        self.cancel.send_replace(true);
        true
    }

    /// Install the service and, when `mode` is given, start it and enable the mode.
    ///
    /// A failure after the install step does not roll the install back.
    pub async fn request_install(&self, mode: Option<ModeAction>) -> Result<StatusInfo, ServiceError> {
        let guard = self.begin(
            Stage::Installing,
            Some(PendingInstall {
                requested_mode: mode,
            }),
        )?;
        info!(mode = ?mode, "install flow started");

        let result = self.run_install(mode).await;
        let status = self.cache.refetch().await;
        drop(guard);

        match &result {
            Ok(()) => {
                info!(status = %status.status, "install flow finished");
                self.notifier
                    .notify("Service installed successfully", "Success", NotifyKind::Info);
            }
            Err(err) => info!(%err, status = %status.status, "install flow ended early"),
        }
        result.map(|()| status)
    }

    /// Disable active modes (best effort), then uninstall the service.
    pub async fn request_uninstall(&self) -> Result<StatusInfo, ServiceError> {
        let guard = self.begin(Stage::DisablingModes, None)?;
        info!("uninstall flow started");

        let result = self.run_uninstall().await;
        let status = self.cache.refetch().await;
        drop(guard);

        if result.is_ok() {
            info!(status = %status.status, "uninstall flow finished");
            self.notifier
                .notify("Service uninstalled successfully", "Success", NotifyKind::Info);
        }
        result.map(|()| status)
    }

    pub async fn request_start(&self) -> Result<StatusInfo, ServiceError> {
        let guard = self.begin(Stage::Starting, None)?;
        let executor = self.executor.clone();
        let result = with_timeout(Operation::Start, self.timeouts.start(), async move {
            executor.start().await
        })
        .await;
        if result.is_ok() {
            self.restart_sidecar().await;
        }
        let status = self.cache.refetch().await;
        drop(guard);
        self.report_simple(result, "Service started successfully", "Failed to start")
            .map(|()| status)
    }

    pub async fn request_stop(&self) -> Result<StatusInfo, ServiceError> {
        let guard = self.begin(Stage::Stopping, None)?;
        let executor = self.executor.clone();
        let result = with_timeout(Operation::Stop, self.timeouts.stop(), async move {
            executor.stop().await
        })
        .await;
        let status = self.cache.refetch().await;
        drop(guard);
        self.report_simple(result, "Service stopped successfully", "Failed to stop")
            .map(|()| status)
    }

    /// Switch one mode on or off under the lifecycle slot.
    ///
    /// A mode already in the requested state is left alone. Switching off the
    /// last active mode stops a running service.
    pub async fn set_mode(&self, action: ModeAction, enable: bool) -> Result<(), ServiceError> {
        let guard = self.begin(Stage::SwitchingMode(action), None)?;
        let result = self.apply_mode(action, enable).await;
        if result.is_ok() && !enable {
            self.stop_if_idle().await;
        }
        self.cache.refetch().await;
        drop(guard);
        result
    }

    fn begin(&self, stage: Stage, pending: Option<PendingInstall>) -> Result<FlowGuard<'_>, ServiceError> {
        let slot = Arc::clone(&self.slot).try_lock_owned().map_err(|_| {
            debug!(requested = stage.label(), current = self.progress().stage_label(), "service flow already running");
            ServiceError::Busy
        })?;
        self.cancel.send_replace(false);
        self.state.send_replace(FlowProgress { stage, pending });
        Ok(FlowGuard {
            _slot: slot,
            state: &self.state,
        })
    }

    fn set_stage(&self, stage: Stage) {
        debug!(stage = stage.label(), "flow stage");
        self.state.send_modify(|progress| progress.stage = stage);
    }

    async fn run_install(&self, mode: Option<ModeAction>) -> Result<(), ServiceError> {
        let executor = self.executor.clone();
        let install = with_timeout(Operation::Install, self.timeouts.install(), async move {
            executor.install().await
        });
        match self.until_cancelled(install).await {
            Ok(()) => {}
            Err(ServiceError::Cancelled) => return Err(ServiceError::Cancelled),
            Err(err) => {
                self.escalate(RecoveryContext::Install, &err);
                return Err(err);
            }
        }
        self.restart_sidecar().await;

        self.verify_install().await?;

        let Some(action) = mode else {
            return Ok(());
        };

        // Start is issued even when verification already reads running.
        self.set_stage(Stage::StartingForMode(action));
        let executor = self.executor.clone();
        with_timeout(Operation::Start, self.timeouts.start(), async move {
            executor.start().await
        })
        .await
        .map_err(|err| self.report_mode_failure(action, err))?;
        self.restart_sidecar().await;

        self.set_stage(Stage::EnablingMode(action));
        self.apply_mode(action, true)
            .await
            .map_err(|err| self.report_mode_failure(action, err))?;
        info!(%action, "mode enabled after install");
        Ok(())
    }

    /// Toggle `action` only when it is not already in the wanted state.
    async fn apply_mode(&self, action: ModeAction, enable: bool) -> Result<(), ServiceError> {
        if self.settings.is_enabled(action).await == enable {
            debug!(%action, enable, "mode already in requested state");
            return Ok(());
        }
        let executor = self.executor.clone();
        with_timeout(Operation::Toggle(action), self.timeouts.toggle(), async move {
            executor.toggle(action).await
        })
        .await
    }

    /// Stop a running service once no mode needs it. Best effort.
    async fn stop_if_idle(&self) {
        let modes = self.settings.mode_state().await;
        if ModeAction::ALL.iter().any(|action| modes.is_enabled(*action)) {
            return;
        }
        if self.cache.refetch().await.status != ServiceStatus::Running {
            return;
        }
        self.set_stage(Stage::Stopping);
        info!("no mode uses the service any more; stopping it");
        let executor = self.executor.clone();
        let result = with_timeout(Operation::Stop, self.timeouts.stop(), async move {
            executor.stop().await
        })
        .await;
        if let Err(err) = result {
            warn!(%err, "failed to stop idle service");
        }
    }

    /// Poll until the service shows up. Running out of attempts is not fatal:
    /// the helper may still be registering.
    async fn verify_install(&self) -> Result<(), ServiceError> {
        let attempts = self.verify.attempts.max(1);
        for attempt in 1..=attempts {
            self.set_stage(Stage::VerifyingInstall { attempt });
            let info = self
                .until_cancelled(async { Ok(self.cache.refetch().await) })
                .await?;
            if info.status.is_installed() {
                debug!(attempt, status = %info.status, "install verified");
                return Ok(());
            }
            if attempt < attempts {
                let delay = self.verify.delay();
                self.until_cancelled(async move {
                    tokio::time::sleep(delay).await;
                    Ok(())
                })
                .await?;
            }
        }
        warn!(attempts, "service not visible after install; continuing");
        Ok(())
    }

    async fn run_uninstall(&self) -> Result<(), ServiceError> {
        let modes = self.settings.mode_state().await;
        for action in ModeAction::ALL {
            if !modes.is_enabled(action) {
                continue;
            }
            let executor = self.executor.clone();
            let result = with_timeout(Operation::Toggle(action), self.timeouts.toggle(), async move {
                executor.toggle(action).await
            })
            .await;
            match result {
                Ok(()) => info!(%action, "mode disabled before uninstall"),
                Err(err) => warn!(%action, %err, "failed to disable mode before uninstall; continuing"),
            }
        }

        self.set_stage(Stage::Uninstalling);
        let executor = self.executor.clone();
        let result = with_timeout(Operation::Uninstall, self.timeouts.uninstall(), async move {
            executor.uninstall().await
        })
        .await;
        if let Err(err) = result {
            self.escalate(RecoveryContext::Uninstall, &err);
            return Err(err);
        }
        self.restart_sidecar().await;
        Ok(())
    }

    async fn until_cancelled<F, T>(&self, future: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        tokio::select! {
            biased;
            _ = cancelled(self.cancel.subscribe()) => Err(ServiceError::Cancelled),
            result = future => result,
        }
    }

    async fn restart_sidecar(&self) {
        if let Err(err) = self.executor.restart_sidecar().await {
            warn!(%err, "failed to restart sidecar");
        }
    }

    /// Notify the user and hand over to manual recovery.
    fn escalate(&self, context: RecoveryContext, err: &ServiceError) {
        let message = if err.is_timeout() {
            "Operation timed out, it may be waiting for UAC/permission prompt".to_string()
        } else {
            match context {
                RecoveryContext::Install => format!("Failed to install system service: {err}"),
                RecoveryContext::Uninstall => format!("Failed to uninstall system service: {err}"),
            }
        };
        self.notifier.notify(&message, "Error", NotifyKind::Error);
        self.advisor.offer(context, err);
    }

    fn report_mode_failure(&self, action: ModeAction, err: ServiceError) -> ServiceError {
        warn!(%action, %err, "service installed but mode could not be enabled");
        self.notifier.notify(
            &format!("Service installed, but {} could not be enabled\n{err}", action.label()),
            "Error",
            NotifyKind::Error,
        );
        err
    }

    fn report_simple(
        &self,
        result: Result<(), ServiceError>,
        success: &str,
        failure: &str,
    ) -> Result<(), ServiceError> {
        match &result {
            Ok(()) => self.notifier.notify(success, "Success", NotifyKind::Info),
            Err(err) => self
                .notifier
                .notify(&format!("{failure}: {err}"), "Error", NotifyKind::Error),
        }
        result
    }
}

/// Resolves once the cancel flag is raised.
async fn cancelled(mut flag: watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
