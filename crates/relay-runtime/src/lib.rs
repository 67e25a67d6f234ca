//! Orchestrates one event-triggered agent run end to end.

pub mod comment_reporting;
pub mod relay_runtime;
pub mod runtime_config;

pub use relay_runtime::{RelayRuntime, RunOutcome};
pub use runtime_config::{AgentSettings, RuntimeConfig, UploadPolicy};
