//! `fortune` - print, load and serve random fortunes.

use std::process::ExitCode;

use clap::Parser;
use rfortune::{logging, Cli, APP_NAME, APP_VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.log_filter());
    tracing::debug!("{} v{}", APP_NAME, APP_VERSION);

    match rfortune::run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{APP_NAME}: {e:#}");
            ExitCode::FAILURE
        }
    }
}
