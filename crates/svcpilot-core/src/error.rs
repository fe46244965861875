//! Error taxonomy for service operations.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::{ModeAction, PermissionKind, ServiceStatus};

/// Step a service error belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Status,
    Install,
    Uninstall,
    Start,
    Stop,
    Toggle(ModeAction),
    ServiceMode,
    RestartSidecar,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Status => f.write_str("status"),
            Operation::Install => f.write_str("install"),
            Operation::Uninstall => f.write_str("uninstall"),
            Operation::Start => f.write_str("start"),
            Operation::Stop => f.write_str("stop"),
            Operation::Toggle(action) => write!(f, "toggle {}", action.label()),
            Operation::ServiceMode => f.write_str("switch service mode"),
            Operation::RestartSidecar => f.write_str("restart sidecar"),
        }
    }
}

/// Failures raised by a transport before any service semantics are applied.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("executable not found: {program}")]
    ExecutableNotFound { program: String },
    #[error("failed to execute {program}: {reason}")]
    Spawn { program: String, reason: String },
    #[error("command `{command}` exited with {code}: {stderr}")]
    Exited {
        command: String,
        code: String,
        stderr: String,
    },
    #[error("local api request failed: {0}")]
    Http(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Outcome errors of orchestrated service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service could not be reached; callers treat this as not installed.
    #[error("service transport unavailable: {0}")]
    TransportUnavailable(String),
    /// The wait was abandoned; the operation itself may still complete.
    #[error("{operation} timed out after {}s", .after.as_secs())]
    OperationTimedOut { operation: Operation, after: Duration },
    #[error("{operation} failed: {reason}")]
    OperationFailed { operation: Operation, reason: String },
    #[error("{} was not confirmed", .0.label())]
    GateBlocked(PermissionKind),
    #[error("service mode requires a running service (currently {0})")]
    ServiceNotRunning(ServiceStatus),
    #[error("another service operation is already in progress")]
    Busy,
    #[error("operation cancelled")]
    Cancelled,
}

impl ServiceError {
    pub fn failed(operation: Operation, err: impl fmt::Display) -> Self {
        ServiceError::OperationFailed {
            operation,
            reason: err.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ServiceError::OperationTimedOut { .. })
    }

    pub fn operation(&self) -> Option<Operation> {
        match self {
            ServiceError::OperationTimedOut { operation, .. }
            | ServiceError::OperationFailed { operation, .. } => Some(*operation),
            _ => None,
        }
    }
}
