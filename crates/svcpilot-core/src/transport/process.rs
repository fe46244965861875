//! Native command channel backed by the helper's control executable.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Operation, ServiceError, TransportError};
use crate::util::log_snippet;
use crate::{ModeSettings, ModeState};

use super::{NativeChannel, NativeCommand};

/// Runs `<program> <args>` for every native command.
#[derive(Debug, Clone)]
pub struct ProcessChannel {
    program: String,
}

impl ProcessChannel {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn label(&self, command: NativeCommand) -> String {
        let mut label = self.program.clone();
        for arg in command.args() {
            label.push(' ');
            label.push_str(arg);
        }
        label
    }
}

#[async_trait]
impl NativeChannel for ProcessChannel {
    async fn invoke(&self, command: NativeCommand) -> Result<String, TransportError> {
        let label = self.label(command);
        debug!(command = %label, "invoking native command");
        // Privileged calls must finish even if the caller stops waiting.
        let output = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => TransportError::ExecutableNotFound {
                    program: self.program.clone(),
                },
                _ => TransportError::Spawn {
                    program: self.program.clone(),
                    reason: err.to_string(),
                },
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let err = exit_error(label, output.status.code(), &output.stderr);
        if let TransportError::Exited { code, stderr, .. } = &err {
            debug!(%code, stderr = %log_snippet(stderr), "native command failed");
        }
        Err(err)
    }
}

/// Failed exit with the helper's stderr kept whole for callers to match on.
fn exit_error(command: String, code: Option<i32>, stderr: &[u8]) -> TransportError {
    TransportError::Exited {
        command,
        code: code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        stderr: String::from_utf8_lossy(stderr).trim_end().to_string(),
    }
}

/// Mode settings read through the native channel's `mode-state` command and
/// written with `service-mode on|off`.
pub struct NativeModeSettings {
    channel: Arc<dyn NativeChannel>,
}

impl NativeModeSettings {
    pub fn new(channel: Arc<dyn NativeChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ModeSettings for NativeModeSettings {
    async fn mode_state(&self) -> ModeState {
        let raw = match self.channel.invoke(NativeCommand::ModeState).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(%err, "failed to read mode state; assuming modes are disabled");
                return ModeState::default();
            }
        };
        match serde_json::from_str(raw.trim()) {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, output = %log_snippet(&raw), "unreadable mode state; assuming modes are disabled");
                ModeState::default()
            }
        }
    }

    async fn set_service_mode(&self, enabled: bool) -> Result<(), ServiceError> {
        self.channel
            .invoke(NativeCommand::SetServiceMode(enabled))
            .await
            .map(|_| ())
            .map_err(|err| {
                warn!(enabled, err = %log_snippet(&err.to_string()), "failed to switch service mode");
                ServiceError::failed(Operation::ServiceMode, err)
            })
    }
}
