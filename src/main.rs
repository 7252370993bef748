use archive_etl::{cli, logging};
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    logging::init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to start async runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(cli::cli()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run aborted");
            eprintln!("archive-etl: {e}");
            ExitCode::FAILURE
        }
    }
}
