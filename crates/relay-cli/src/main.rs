use std::process::ExitCode;

use clap::Parser;
use relay_cli::{build_runtime, init_tracing, Cli};
use relay_runtime::RunOutcome;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let result = match build_runtime(&cli) {
        Ok(runtime) => runtime.run().await,
        Err(error) => Err(error),
    };
    match result {
        Ok(RunOutcome::Skipped { reason }) => {
            tracing::info!(%reason, "run skipped");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Completed {
            subject,
            resumed,
            uploaded,
            response_chars,
        }) => {
            tracing::info!(%subject, resumed, uploaded, response_chars, "run completed");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "run failed");
            ExitCode::FAILURE
        }
    }
}
