use std::process::ExitCode;

use clap::Parser;
use dotenvy::dotenv;
use tracing::error;

use helm_ssm::cli::{self, Args};

fn main() -> ExitCode {
    dotenv().ok();

    cli::setup_logging();

    let args = Args::parse();

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Rendering failed: {:#}", e);
            for cause in e.chain() {
                eprintln!("{}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
