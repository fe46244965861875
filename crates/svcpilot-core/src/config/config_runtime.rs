//! Run context resolution.
//!
//! The context is resolved once at start-up and never re-evaluated.

use std::env;

use super::ContextSetting;

const CONTEXT_ENV: &str = "SVCPILOT_CONTEXT";

/// Environment the status source runs in.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunContext {
    /// Embedded in the native runtime; status comes from the native command channel.
    Native,
    /// Plain web context; status comes from the local HTTP endpoint.
    Web,
}

impl RunContext {
    pub fn resolve(setting: ContextSetting) -> Self {
        resolve_from(setting, env::var(CONTEXT_ENV).ok().as_deref())
    }
}

fn resolve_from(setting: ContextSetting, env_value: Option<&str>) -> RunContext {
    match setting {
        ContextSetting::Native => RunContext::Native,
        ContextSetting::Web => RunContext::Web,
        ContextSetting::Auto => match env_value.map(|value| value.trim().to_ascii_lowercase()) {
            Some(value) if value == "web" || value == "browser" => RunContext::Web,
            _ => RunContext::Native,
        },
    }
}
