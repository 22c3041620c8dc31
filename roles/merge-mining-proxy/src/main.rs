//! Entry point for the merge-mining proxy.
//!
//! This binary parses CLI arguments, loads the TOML configuration file, and serves `getwork`
//! through `merge_mining_proxy::MergeMiningProxy` until interrupted.
mod args;
use args::process_cli_args;
use config_helpers_mm::logging::init_logging;
use merge_mining_proxy::MergeMiningProxy;
use std::process::ExitCode;
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let config = match process_cli_args() {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging is not up yet.
            eprintln!("Failed to process CLI arguments: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(config.log_file()) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match MergeMiningProxy::new(config).start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Merge-mining proxy stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
