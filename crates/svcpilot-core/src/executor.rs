//! Discrete service mutations against the native command channel.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Operation, ServiceError};
use crate::status_cache::StatusCache;
use crate::transport::{NativeChannel, NativeCommand};
use crate::util::log_snippet;
use crate::ModeAction;

/// One call per verb, no retries. Successful mutations invalidate the status cache.
#[derive(Clone)]
pub struct MutationExecutor {
    channel: Arc<dyn NativeChannel>,
    cache: Arc<StatusCache>,
}

impl MutationExecutor {
    pub fn new(channel: Arc<dyn NativeChannel>, cache: Arc<StatusCache>) -> Self {
        Self { channel, cache }
    }

    pub async fn install(&self) -> Result<(), ServiceError> {
        self.run(NativeCommand::ServiceInstall, Operation::Install)
            .await
    }

    pub async fn uninstall(&self) -> Result<(), ServiceError> {
        self.run(NativeCommand::ServiceUninstall, Operation::Uninstall)
            .await
    }

    pub async fn start(&self) -> Result<(), ServiceError> {
        self.run(NativeCommand::ServiceStart, Operation::Start).await
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.run(NativeCommand::ServiceStop, Operation::Stop).await
    }

    /// Flip a dependent mode through the native channel.
    pub async fn toggle(&self, action: ModeAction) -> Result<(), ServiceError> {
        self.run(NativeCommand::toggle(action), Operation::Toggle(action))
            .await
    }

    /// Ask the application to restart its core so it reconnects to the service.
    pub async fn restart_sidecar(&self) -> Result<(), ServiceError> {
        self.channel
            .invoke(NativeCommand::RestartSidecar)
            .await
            .map(|_| ())
            .map_err(|err| ServiceError::failed(Operation::RestartSidecar, err))
    }

    async fn run(&self, command: NativeCommand, operation: Operation) -> Result<(), ServiceError> {
        match self.channel.invoke(command).await {
            Ok(_) => {
                info!(%operation, "service operation completed");
                self.cache.invalidate();
                Ok(())
            }
            Err(err) => {
                warn!(%operation, error = %log_snippet(&err.to_string()), "service operation failed");
                Err(ServiceError::failed(operation, err))
            }
        }
    }
}
