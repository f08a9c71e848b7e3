use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use summit_config::{ConfigurationLoader, GenericConfiguration};
use summit_core::exposition::{ExpositionFormat, EXPOSITION_RESOURCE};
use summit_error::{ErrorContext as _, GenericError};
use tracing::level_filters::LevelFilter;

/// Prefix of environment variables that override file-based configuration.
const ENV_PREFIX: &str = "SUMMIT";

#[derive(Parser)]
#[command(about)]
pub struct Cli {
    /// Enable verbose output. (Specify twice for more verbosity.)
    #[arg(global = true, short = 'v', long, action = ArgAction::Count, default_value_t = 0)]
    verbose: u8,

    /// Path to a YAML or JSON configuration file.
    ///
    /// Any value in the file can be overridden with a `SUMMIT_`-prefixed environment variable, such as
    /// `SUMMIT_SCRAPE_ADDRESS` for `scrape.address`.
    #[arg(global = true, short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub action: Action,
}

impl Cli {
    /// Gets the configured log level based on the user-supplied verbosity level.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Loads the configuration file, if one was given, layered beneath the environment.
    pub fn load_configuration(&self) -> Result<GenericConfiguration, GenericError> {
        let mut loader = ConfigurationLoader::default();
        if let Some(path) = &self.config {
            loader = loader
                .from_file(path)
                .with_error_context(|| format!("Failed to load configuration file '{}'.", path.display()))?;
        }

        let loader = loader
            .from_environment(ENV_PREFIX)
            .error_context("Failed to load configuration from the environment.")?;

        Ok(loader.into_generic())
    }
}

#[derive(Subcommand)]
pub enum Action {
    /// Scrape a remote endpoint and print every decoded sample.
    #[command(name = "scrape")]
    Scrape(ScrapeConfig),

    /// Feed synthetic request latencies into a summary and print the resulting exposition.
    #[command(name = "simulate")]
    Simulate(SimulateConfig),
}

/// Scrape configuration.
#[derive(Args, Clone, Debug)]
pub struct ScrapeConfig {
    /// Base address of the remote endpoint, such as `http://localhost:9090`.
    ///
    /// Falls back to `scrape.address` from the configuration.
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// Path of the exposition resource, relative to the base address.
    #[arg(short = 'e', long, default_value = EXPOSITION_RESOURCE)]
    pub endpoint: String,
}

/// Simulation configuration.
#[derive(Args, Clone, Debug)]
pub struct SimulateConfig {
    /// Number of synthetic observations to record.
    #[arg(short = 'n', long, default_value_t = 10_000)]
    pub count: usize,

    /// Seed for the random number generator, for reproducible runs.
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Exposition format to print.
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

/// Exposition format selectable from the command line.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Text exposition format.
    Text,

    /// JSON telemetry schema.
    Json,
}

impl From<OutputFormat> for ExpositionFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ExpositionFormat::Text,
            OutputFormat::Json => ExpositionFormat::Json,
        }
    }
}
