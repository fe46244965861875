//! Configuration types and defaults for svcpilot.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub service: ServiceConfig,
    pub status: StatusConfig,
    pub timeouts: TimeoutConfig,
    pub verify: VerifyConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Registered name of the helper service.
    pub name: String,
    /// Helper control executable used for native commands and manual guidance.
    pub program: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "nyanpasu-service".to_string(),
            program: "nyanpasu-service".to_string(),
        }
    }
}

/// Which transport the status source uses.
#[derive(Debug, Copy, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextSetting {
    #[default]
    Auto,
    Native,
    Web,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatusConfig {
    pub context: ContextSetting,
    pub poll_interval_ms: u64,
    /// Base URL of the local status API, only used in web context.
    pub endpoint: String,
    pub status_path: String,
    pub probe_timeout_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            context: ContextSetting::Auto,
            poll_interval_ms: 5000,
            endpoint: "http://127.0.0.1:33211".to_string(),
            status_path: "/__local_api/service/status".to_string(),
            probe_timeout_ms: 3000,
        }
    }
}

impl StatusConfig {
    pub fn poll_interval(&self) -> Duration {
        // A zero interval would spin the poller.
        Duration::from_millis(self.poll_interval_ms.max(100))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub install_ms: u64,
    pub uninstall_ms: u64,
    pub start_ms: u64,
    pub stop_ms: u64,
    pub toggle_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            install_ms: 60_000,
            uninstall_ms: 60_000,
            start_ms: 30_000,
            stop_ms: 30_000,
            toggle_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    pub fn install(&self) -> Duration {
        Duration::from_millis(self.install_ms)
    }

    pub fn uninstall(&self) -> Duration {
        Duration::from_millis(self.uninstall_ms)
    }

    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    pub fn stop(&self) -> Duration {
        Duration::from_millis(self.stop_ms)
    }

    pub fn toggle(&self) -> Duration {
        Duration::from_millis(self.toggle_ms)
    }
}

/// Post-install polling until the service registers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VerifyConfig {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_ms: 500,
        }
    }
}

impl VerifyConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}
