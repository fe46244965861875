//! Status sources for the native command channel and the local HTTP endpoint.
//!
//! Both sources absorb every failure and report `NotInstalled` instead: an
//! unreachable service is handled exactly like an absent one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::{HttpProbe, LocalApiProbe, NativeChannel, NativeCommand};
use crate::util::log_snippet;
use crate::{Config, RunContext, ServiceStatus, StatusInfo};

/// Produces the current service status. Never fails.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self) -> StatusInfo;
}

/// Substrings of transport errors that mean the helper is missing or its
/// command is not recognized. Matched against the lowercased message.
///
/// Free-text matching breaks when the transport rewords its errors; a
/// structured error code from the channel would replace this table.
const TRANSPORT_ERROR_TABLE: &[(&str, ServiceStatus)] = &[
    ("executable not found", ServiceStatus::NotInstalled),
    ("command not found", ServiceStatus::NotInstalled),
    ("service not found", ServiceStatus::NotInstalled),
    ("could not be found", ServiceStatus::NotInstalled),
    ("not installed", ServiceStatus::NotInstalled),
    ("does not exist", ServiceStatus::NotInstalled),
    ("no such file or directory", ServiceStatus::NotInstalled),
    ("cannot find the file", ServiceStatus::NotInstalled),
    ("is not recognized as an internal or external command", ServiceStatus::NotInstalled),
    ("unknown command", ServiceStatus::NotInstalled),
    ("找不到", ServiceStatus::NotInstalled),
    ("不存在", ServiceStatus::NotInstalled),
    ("不是内部或外部命令", ServiceStatus::NotInstalled),
    ("未安装", ServiceStatus::NotInstalled),
];

/// Map a transport error message to the status it implies, if it is known.
pub fn classify_transport_error(message: &str) -> Option<ServiceStatus> {
    let lowered = message.to_lowercase();
    TRANSPORT_ERROR_TABLE
        .iter()
        .find(|(marker, _)| lowered.contains(marker))
        .map(|(_, status)| *status)
}

/// Build the status source for the resolved run context.
pub fn for_context(
    context: RunContext,
    config: &Config,
    channel: Arc<dyn NativeChannel>,
) -> Result<Arc<dyn StatusSource>, TransportError> {
    let source: Arc<dyn StatusSource> = match context {
        RunContext::Native => Arc::new(NativeStatusSource::new(channel)),
        RunContext::Web => {
            let probe = LocalApiProbe::new(&config.status.endpoint, config.status.probe_timeout())?;
            Arc::new(WebStatusSource::new(
                Arc::new(probe),
                config.status.status_path.clone(),
            ))
        }
    };
    Ok(source)
}

/// Status read through the native `status` command.
pub struct NativeStatusSource {
    channel: Arc<dyn NativeChannel>,
}

impl NativeStatusSource {
    pub fn new(channel: Arc<dyn NativeChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl StatusSource for NativeStatusSource {
    async fn fetch_status(&self) -> StatusInfo {
        let raw = match self.channel.invoke(NativeCommand::ServiceStatus).await {
            Ok(raw) => raw,
            Err(err) => {
                let message = err.to_string();
                let status = match classify_transport_error(&message) {
                    Some(status) => {
                        debug!(error = %log_snippet(&message), %status, "service appears not installed");
                        status
                    }
                    None => {
                        warn!(error = %log_snippet(&message), "service status command failed; treating as not installed");
                        ServiceStatus::NotInstalled
                    }
                };
                return StatusInfo {
                    status,
                    ..StatusInfo::not_installed()
                };
            }
        };

        match serde_json::from_str::<StatusInfo>(raw.trim()) {
            Ok(info) => info,
            Err(err) => {
                warn!(%err, output = %log_snippet(&raw), "unreadable service status; treating as not installed");
                StatusInfo::not_installed()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocalApiStatus {
    status: Option<ServiceStatus>,
    version: Option<String>,
}

/// Status read from the local HTTP endpoint.
pub struct WebStatusSource {
    probe: Arc<dyn HttpProbe>,
    path: String,
}

impl WebStatusSource {
    pub fn new(probe: Arc<dyn HttpProbe>, path: impl Into<String>) -> Self {
        Self {
            probe,
            path: path.into(),
        }
    }
}

#[async_trait]
impl StatusSource for WebStatusSource {
    async fn fetch_status(&self) -> StatusInfo {
        let response = match self.probe.get(&self.path).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "failed to query local api; treating as not installed");
                return StatusInfo::not_installed();
            }
        };
        if !response.is_success() {
            warn!(status = response.status, "local api returned an error status");
            return StatusInfo::not_installed();
        }
        match serde_json::from_str::<LocalApiStatus>(&response.body) {
            Ok(payload) => StatusInfo {
                name: String::new(),
                version: payload.version.unwrap_or_default(),
                status: payload.status.unwrap_or(ServiceStatus::NotInstalled),
                server_endpoint: None,
            },
            Err(err) => {
                warn!(%err, body = %log_snippet(&response.body), "unreadable local api payload");
                StatusInfo::not_installed()
            }
        }
    }
}
