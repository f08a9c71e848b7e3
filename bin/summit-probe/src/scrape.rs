use std::{collections::HashMap, io::Write, time::SystemTime};

use http::{
    header::{ACCEPT, CONTENT_TYPE},
    Request,
};
use http_body_util::Empty;
use summit_config::GenericConfiguration;
use summit_context::LabelSet;
use summit_core::exposition::{DELIMITED_TELEMETRY_CONTENT_TYPE, TELEMETRY_CONTENT_TYPE};
use summit_error::{generic_error, ErrorContext as _, GenericError};
use summit_io::{
    deser::{processor_for_content_type, DecodeError, Ingester, ProcessOptions, Sample},
    net::client::{HttpClient, HttpClientConfiguration},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::ScrapeConfig;

/// Scrapes the configured endpoint once and prints every decoded sample to standard output.
///
/// Interrupting the process (Ctrl-C) cancels the in-flight request.
pub async fn handle_scrape(config: ScrapeConfig, configuration: &GenericConfiguration) -> Result<(), GenericError> {
    let address = match config.address {
        Some(address) => address,
        None => configuration
            .try_get_typed::<String>("scrape.address")?
            .ok_or_else(|| generic_error!("No scrape address given. Pass `--address` or set `SUMMIT_SCRAPE_ADDRESS`."))?,
    };

    let client =
        HttpClient::new(&HttpClientConfiguration::new(address)).error_context("Failed to create HTTP client.")?;

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted. Cancelling scrape...");
            signal_token.cancel();
        }
    });

    let url = client.url(&config.endpoint, &HashMap::new());
    let request = Request::get(url.as_str())
        .header(ACCEPT, accept_header())
        .body(Empty::new())
        .error_context("Failed to build scrape request.")?;

    info!(%url, "Scraping...");
    let scraped_at = SystemTime::now();
    let (response, body) = client
        .send(request, &token)
        .await
        .with_error_context(|| format!("Failed to scrape '{}'.", url))?;

    if !response.status().is_success() {
        return Err(generic_error!("Scrape of '{}' failed with status {}.", url, response.status()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let processor = processor_for_content_type(content_type)?;

    let options = ProcessOptions::at(scraped_at).with_base_labels(target_labels(&url));
    let mut printer = SamplePrinter::new(std::io::stdout().lock());
    processor.process_single(&body, &options, &mut printer)?;

    info!(
        samples = printer.samples,
        errors = printer.errors,
        "Scrape complete."
    );

    Ok(())
}

/// Builds the `Accept` header, preferring the delimited protocol buffers format over JSON.
fn accept_header() -> String {
    format!(
        "{}; q=0.7, {}; q=0.3",
        DELIMITED_TELEMETRY_CONTENT_TYPE, TELEMETRY_CONTENT_TYPE
    )
}

/// Labels identifying the scraped target, merged beneath every sample's own labels.
fn target_labels(url: &Url) -> LabelSet {
    let mut labels = LabelSet::new();
    if let Some(host) = url.host_str() {
        let instance = match url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        labels.insert("instance", instance);
    }
    labels
}

/// Writes every ingested sample as a line of text, logging decoding errors as they arrive.
struct SamplePrinter<W> {
    writer: W,
    samples: usize,
    errors: usize,
}

impl<W: Write> SamplePrinter<W> {
    fn new(writer: W) -> Self {
        Self {
            writer,
            samples: 0,
            errors: 0,
        }
    }
}

impl<W: Write> Ingester for SamplePrinter<W> {
    fn ingest(&mut self, result: Result<Vec<Sample>, DecodeError>) {
        match result {
            Ok(samples) => {
                for sample in samples {
                    if let Err(e) = writeln!(self.writer, "{}", sample) {
                        warn!(error = %e, "Failed to write sample.");
                    }
                    self.samples += 1;
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to decode part of the scrape.");
                self.errors += 1;
            }
        }
    }
}
