//! Decoders for scraped telemetry payloads.
//!
//! A [`Processor`] turns one payload into [`Sample`]s and hands them to an [`Ingester`] in batches. Decoding errors
//! that only affect part of a payload are reported to the ingester as well, so a single malformed entity does not
//! discard the rest of the scrape.

use std::{fmt, time::SystemTime};

use snafu::Snafu;
use summit_context::LabelSet;
use summit_core::exposition::{API_VERSION, DELIMITED_TELEMETRY_CONTENT_TYPE, TELEMETRY_CONTENT_TYPE};

mod json;
pub use self::json::JsonProcessor;

pub mod protobuf;
pub use self::protobuf::MetricFamilyProcessor;

/// Decode error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum DecodeError {
    /// The payload was not a valid JSON document of the expected shape.
    #[snafu(display("failed to decode JSON payload: {}", source))]
    Json { source: serde_json::Error },

    /// The value of an entity did not match the shape required by its metric type.
    #[snafu(display("could not extract {} value: {}", metric_type, source))]
    InvalidValue {
        metric_type: String,
        source: serde_json::Error,
    },

    /// An entity declared a metric type that is not understood.
    #[snafu(display("unknown metric type {:?}", metric_type))]
    UnknownMetricType { metric_type: String },

    /// A length-delimited protocol buffers record could not be decoded.
    #[snafu(display("failed to decode protocol buffers record: {}", source))]
    Protobuf { source: prost::DecodeError },

    /// No processor handles the given content type.
    #[snafu(display("unsupported content type {:?}", content_type))]
    UnsupportedContentType { content_type: String },
}

/// A single decoded sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Labels identifying the series, including the metric name under
    /// [`METRIC_NAME_LABEL`][summit_context::METRIC_NAME_LABEL].
    pub metric: LabelSet,

    /// Sample value.
    pub value: f64,

    /// Time at which the sample was scraped, if known.
    pub timestamp: Option<SystemTime>,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.metric, self.value)
    }
}

/// Options applied to every sample decoded from a payload.
#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
    /// Timestamp assigned to every sample.
    pub timestamp: Option<SystemTime>,

    /// Labels of the scrape target.
    ///
    /// These are merged into every sample. When a sample carries a label of the same name, the sample's value wins.
    pub base_labels: LabelSet,
}

impl ProcessOptions {
    /// Creates options that stamp every sample with the given timestamp.
    pub fn at(timestamp: SystemTime) -> Self {
        Self {
            timestamp: Some(timestamp),
            base_labels: LabelSet::new(),
        }
    }

    /// Sets the labels of the scrape target.
    pub fn with_base_labels(mut self, base_labels: LabelSet) -> Self {
        self.base_labels = base_labels;
        self
    }

    fn sample(&self, labels: LabelSet, value: f64) -> Sample {
        Sample {
            metric: self.base_labels.merged(&labels),
            value,
            timestamp: self.timestamp,
        }
    }
}

/// Receives the results of decoding a payload.
pub trait Ingester {
    /// Ingests a batch of samples, or an error affecting part of the payload.
    fn ingest(&mut self, result: Result<Vec<Sample>, DecodeError>);
}

impl Ingester for Vec<Result<Vec<Sample>, DecodeError>> {
    fn ingest(&mut self, result: Result<Vec<Sample>, DecodeError>) {
        self.push(result);
    }
}

/// Decodes a telemetry payload.
pub trait Processor: Send + Sync {
    /// Decodes `input`, handing every batch of samples to `ingester`.
    ///
    /// # Errors
    ///
    /// If the payload as a whole cannot be decoded, an error is returned. Samples ingested before the error was
    /// encountered are not retracted.
    fn process_single(
        &self, input: &[u8], options: &ProcessOptions, ingester: &mut dyn Ingester,
    ) -> Result<(), DecodeError>;
}

static JSON_PROCESSOR: JsonProcessor = JsonProcessor;
static METRIC_FAMILY_PROCESSOR: MetricFamilyProcessor = MetricFamilyProcessor;

/// Selects the processor for a payload from its `Content-Type` header.
///
/// # Errors
///
/// If the content type is not one of [`TELEMETRY_CONTENT_TYPE`] or [`DELIMITED_TELEMETRY_CONTENT_TYPE`] (parameters
/// may appear in any order and with or without quotes), an error is returned.
pub fn processor_for_content_type(content_type: &str) -> Result<&'static dyn Processor, DecodeError> {
    let parsed = MediaType::parse(content_type);

    match parsed.essence.as_str() {
        "application/json"
            if parsed.param("schema") == Some("prometheus/telemetry") && parsed.param("version") == Some(API_VERSION) =>
        {
            Ok(&JSON_PROCESSOR)
        }
        "application/vnd.google.protobuf"
            if parsed.param("proto") == Some("io.prometheus.client.MetricFamily")
                && parsed.param("encoding") == Some("delimited") =>
        {
            Ok(&METRIC_FAMILY_PROCESSOR)
        }
        _ => UnsupportedContentType { content_type }.fail(),
    }
}

/// A parsed `type/subtype; name=value` media type.
struct MediaType<'a> {
    essence: String,
    params: Vec<(&'a str, &'a str)>,
}

impl<'a> MediaType<'a> {
    fn parse(raw: &'a str) -> Self {
        let mut parts = raw.split(';');
        let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
        let params = parts
            .filter_map(|param| param.split_once('='))
            .map(|(name, value)| (name.trim(), value.trim().trim_matches('"')))
            .collect();

        Self { essence, params }
    }

    fn param(&self, name: &str) -> Option<&'a str> {
        self.params
            .iter()
            .find(|(param, _)| param.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }
}
