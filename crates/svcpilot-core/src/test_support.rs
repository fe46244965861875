//! In-memory collaborators shared by the unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::advisor::{ManualRecoveryAdvisor, RecoveryGuidance, RecoveryPresenter};
use crate::error::TransportError;
use crate::executor::MutationExecutor;
use crate::gate::ModeGate;
use crate::orchestrator::LifecycleOrchestrator;
use crate::status_cache::StatusCache;
use crate::status_source::NativeStatusSource;
use crate::transport::{HttpProbe, NativeChannel, NativeCommand, NativeModeSettings, ProbeResponse};
use crate::{
    Config, Confirmer, ModeState, Notifier, NotifyKind, PermissionKind, ServiceStatus,
    StatusInfo,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Default)]
struct FakeState {
    status: Option<ServiceStatus>,
    raw_status: Option<String>,
    modes: ModeState,
    failures: HashMap<NativeCommand, String>,
    delays: HashMap<NativeCommand, Duration>,
    log: Vec<NativeCommand>,
    keep_status_on_install: bool,
}

/// Scripted native channel that behaves like a well-mannered helper.
#[derive(Default)]
pub struct FakeChannel {
    state: Mutex<FakeState>,
}

impl FakeChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn status(&self) -> ServiceStatus {
        lock(&self.state).status.unwrap_or(ServiceStatus::NotInstalled)
    }

    pub fn set_status(&self, status: ServiceStatus) {
        let mut state = lock(&self.state);
        state.status = Some(status);
        state.raw_status = None;
    }

    pub fn set_raw_status(&self, raw: &str) {
        lock(&self.state).raw_status = Some(raw.to_string());
    }

    pub fn mode_state(&self) -> ModeState {
        lock(&self.state).modes
    }

    pub fn set_mode_state(&self, modes: ModeState) {
        lock(&self.state).modes = modes;
    }

    pub fn fail_command(&self, command: NativeCommand, message: &str) {
        lock(&self.state)
            .failures
            .insert(command, message.to_string());
    }

    pub fn delay_command(&self, command: NativeCommand, delay: Duration) {
        lock(&self.state).delays.insert(command, delay);
    }

    /// Install reports success without the service ever showing up.
    pub fn keep_status_on_install(&self) {
        lock(&self.state).keep_status_on_install = true;
    }

    pub fn calls(&self, command: NativeCommand) -> usize {
        lock(&self.state)
            .log
            .iter()
            .filter(|logged| **logged == command)
            .count()
    }

    /// Mutating commands in the order they were issued, failed ones included.
    pub fn mutation_log(&self) -> Vec<NativeCommand> {
        lock(&self.state)
            .log
            .iter()
            .copied()
            .filter(|command| command.is_mutation())
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutation_log().len()
    }

    fn apply(&self, command: NativeCommand) -> String {
        let mut state = lock(&self.state);
        let status = state.status.unwrap_or(ServiceStatus::NotInstalled);
        match command {
            NativeCommand::ServiceStatus => {
                if let Some(raw) = &state.raw_status {
                    return raw.clone();
                }
                let info = StatusInfo {
                    name: "nyanpasu-service".to_string(),
                    version: "1.4.0".to_string(),
                    status,
                    server_endpoint: None,
                };
                return serde_json::to_string(&info).unwrap_or_default();
            }
            NativeCommand::ModeState => {
                return serde_json::to_string(&state.modes).unwrap_or_default();
            }
            NativeCommand::ServiceInstall => {
                if !state.keep_status_on_install {
                    state.status = Some(ServiceStatus::Stopped);
                }
            }
            NativeCommand::ServiceUninstall => state.status = Some(ServiceStatus::NotInstalled),
            NativeCommand::ServiceStart => state.status = Some(ServiceStatus::Running),
            NativeCommand::ServiceStop => state.status = Some(ServiceStatus::Stopped),
            NativeCommand::ToggleSystemProxy => {
                state.modes.system_proxy = !state.modes.system_proxy;
                if state.modes.system_proxy && status == ServiceStatus::Stopped {
                    state.status = Some(ServiceStatus::Running);
                }
            }
            NativeCommand::ToggleTunMode => {
                state.modes.tun = !state.modes.tun;
                if state.modes.tun && status == ServiceStatus::Stopped {
                    state.status = Some(ServiceStatus::Running);
                }
            }
            NativeCommand::SetServiceMode(enabled) => state.modes.service_mode = enabled,
            NativeCommand::RestartSidecar => {}
        }
        String::new()
    }
}

#[async_trait]
impl NativeChannel for FakeChannel {
    async fn invoke(&self, command: NativeCommand) -> Result<String, TransportError> {
        let (delay, failure) = {
            let mut state = lock(&self.state);
            state.log.push(command);
            (
                state.delays.get(&command).copied(),
                state.failures.get(&command).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(stderr) = failure {
            return Err(TransportError::Exited {
                command: format!("fake-helper {}", command.args().join(" ")),
                code: "1".to_string(),
                stderr,
            });
        }
        Ok(self.apply(command))
    }
}

/// Probe that replays the last scripted response.
pub struct FakeProbe {
    response: Mutex<Result<ProbeResponse, String>>,
    paths: Mutex<Vec<String>>,
}

impl FakeProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            response: Mutex::new(Err("no response scripted".to_string())),
            paths: Mutex::new(Vec::new()),
        })
    }

    pub fn respond(&self, response: Result<ProbeResponse, String>) {
        *lock(&self.response) = response;
    }

    pub fn paths(&self) -> Vec<String> {
        lock(&self.paths).clone()
    }
}

#[async_trait]
impl HttpProbe for FakeProbe {
    async fn get(&self, path: &str) -> Result<ProbeResponse, TransportError> {
        lock(&self.paths).push(path.to_string());
        lock(&self.response).clone().map_err(TransportError::Http)
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    messages: Mutex<Vec<(String, String, NotifyKind)>>,
}

impl FakeNotifier {
    pub fn messages(&self) -> Vec<(String, String, NotifyKind)> {
        lock(&self.messages).clone()
    }
}

impl Notifier for FakeNotifier {
    fn notify(&self, message: &str, title: &str, kind: NotifyKind) {
        lock(&self.messages).push((message.to_string(), title.to_string(), kind));
    }
}

/// Confirmer with a fixed answer. Records how many mutations had been
/// issued on the channel each time it was asked.
pub struct FakeConfirmer {
    channel: Arc<FakeChannel>,
    answer: Mutex<bool>,
    asked: Mutex<Vec<PermissionKind>>,
    mutations_seen: Mutex<Vec<usize>>,
}

impl FakeConfirmer {
    pub fn new(channel: Arc<FakeChannel>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            answer: Mutex::new(true),
            asked: Mutex::new(Vec::new()),
            mutations_seen: Mutex::new(Vec::new()),
        })
    }

    pub fn answer(&self, answer: bool) {
        *lock(&self.answer) = answer;
    }

    pub fn asked(&self) -> Vec<PermissionKind> {
        lock(&self.asked).clone()
    }

    pub fn mutations_seen(&self) -> Vec<usize> {
        lock(&self.mutations_seen).clone()
    }
}

#[async_trait]
impl Confirmer for FakeConfirmer {
    async fn confirm(&self, permission: PermissionKind) -> bool {
        lock(&self.asked).push(permission);
        lock(&self.mutations_seen).push(self.channel.mutation_count());
        *lock(&self.answer)
    }
}

#[derive(Default)]
pub struct RecordingPresenter {
    presented: Mutex<Vec<RecoveryGuidance>>,
}

impl RecordingPresenter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn presented(&self) -> Vec<RecoveryGuidance> {
        lock(&self.presented).clone()
    }
}

impl RecoveryPresenter for RecordingPresenter {
    fn present(&self, guidance: RecoveryGuidance) {
        lock(&self.presented).push(guidance);
    }
}

/// Fully wired core over fakes, using the default configuration.
pub struct Harness {
    pub channel: Arc<FakeChannel>,
    pub cache: Arc<StatusCache>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
    pub gate: ModeGate,
    pub notifier: Arc<FakeNotifier>,
    pub confirmer: Arc<FakeConfirmer>,
    pub presenter: Arc<RecordingPresenter>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_status(ServiceStatus::NotInstalled)
    }

    pub fn with_status(status: ServiceStatus) -> Self {
        let config = Config::default();
        let channel = FakeChannel::new();
        channel.set_status(status);

        let cache = StatusCache::new(Arc::new(NativeStatusSource::new(channel.clone())));
        let executor = MutationExecutor::new(channel.clone(), cache.clone());
        let settings = Arc::new(NativeModeSettings::new(channel.clone()));
        let notifier = Arc::new(FakeNotifier::default());
        let confirmer = FakeConfirmer::new(channel.clone());
        let presenter = RecordingPresenter::new();
        let advisor = ManualRecoveryAdvisor::new(
            config.service.program.clone(),
            config.service.name.clone(),
            presenter.clone(),
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
            confirmer.clone(),
            notifier.clone(),
        );

        Self {
            channel,
            cache,
            orchestrator,
            gate,
            notifier,
            confirmer,
            presenter,
        }
    }
}

