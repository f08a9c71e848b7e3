//! Renderers for gathered metrics.

use snafu::Snafu;

use crate::MetricFamily;

mod json;
pub use self::json::render_json;

mod text;
pub use self::text::{render_text, write_text};

/// Version of the JSON telemetry schema produced by [`render_json`].
pub const API_VERSION: &str = "0.0.2";

/// Content type of the JSON telemetry format.
pub const TELEMETRY_CONTENT_TYPE: &str = r#"application/json; schema="prometheus/telemetry"; version=0.0.2"#;

/// Content type of the length-delimited protocol buffers format.
pub const DELIMITED_TELEMETRY_CONTENT_TYPE: &str =
    r#"application/vnd.google.protobuf; proto="io.prometheus.client.MetricFamily"; encoding="delimited""#;

/// Content type of the text exposition format.
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Customary path under which metrics are exposed.
pub const EXPOSITION_RESOURCE: &str = "/metrics";

/// Exposition error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ExpositionError {
    /// Gathered metrics could not be serialized.
    #[snafu(display("failed to serialize metrics"))]
    Serialization { source: serde_json::Error },
}

/// Exposition format.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ExpositionFormat {
    /// Text exposition format, version 0.0.4.
    #[default]
    Text,

    /// JSON telemetry schema, version 0.0.2.
    Json,
}

impl ExpositionFormat {
    /// Returns the content type of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text => TEXT_CONTENT_TYPE,
            Self::Json => TELEMETRY_CONTENT_TYPE,
        }
    }

    /// Renders the given metric families in this format.
    ///
    /// # Errors
    ///
    /// If the metrics cannot be serialized, an error is returned.
    pub fn render(&self, families: &[MetricFamily]) -> Result<String, ExpositionError> {
        match self {
            Self::Text => Ok(render_text(families)),
            Self::Json => render_json(families),
        }
    }
}

/// Formats a sample value the way exposition formats spell special values.
pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
