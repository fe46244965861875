//! Lifecycle orchestration for the privileged proxy/TUN helper service.

pub mod advisor;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod status_cache;
pub mod status_source;
pub mod timeout;
pub mod transport;
pub mod util;

#[cfg(test)]
mod test_support;

pub use advisor::*;
pub use collaborators::*;
pub use config::*;
pub use error::*;
pub use executor::MutationExecutor;
pub use gate::{ModeGate, ToggleOutcome};
pub use model::*;
pub use orchestrator::{FlowProgress, LifecycleOrchestrator, Stage};
pub use status_cache::{CachedStatus, StatusCache};
pub use status_source::{classify_transport_error, NativeStatusSource, StatusSource, WebStatusSource};
pub use timeout::with_timeout;
pub use util::program_in_path;
