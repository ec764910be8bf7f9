// src/main.rs

use std::process::ExitCode;

use buildrig::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.debug) {
        eprintln!("buildrig error: {err:?}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(err) => {
            tracing::error!(error = %err, "buildrig failed");
            ExitCode::from(err.exit_code())
        }
    }
}
