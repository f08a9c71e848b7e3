//! Command-line probe for Summit metrics.
//!
//! `scrape` fetches a remote exposition endpoint once, decodes it based on its content type, and prints every sample.
//! `simulate` drives a local summary with synthetic request latencies and prints the resulting exposition.

use clap::Parser as _;
use summit_app::prelude::*;
use summit_error::GenericError;
use tracing::error;

mod config;
use self::config::{Action, Cli};

mod scrape;
use self::scrape::handle_scrape;

mod simulate;
use self::simulate::handle_simulate;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = initialize_logging(Some(cli.log_level())) {
        fatal_and_exit(format!("failed to initialize logging: {}", e));
    }

    if let Err(e) = run(cli).await {
        error!("{:?}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), GenericError> {
    let configuration = cli.load_configuration()?;

    match cli.action {
        Action::Scrape(config) => handle_scrape(config, &configuration).await,
        Action::Simulate(config) => handle_simulate(config, &configuration),
    }
}
