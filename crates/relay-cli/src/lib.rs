//! Command-line and environment configuration for the `relay-action` binary.

pub mod bootstrap_helpers;
pub mod cli_args;
pub mod runtime_setup;

pub use bootstrap_helpers::init_tracing;
pub use cli_args::Cli;
pub use runtime_setup::{build_runtime, build_runtime_config, workflow_run_url};
