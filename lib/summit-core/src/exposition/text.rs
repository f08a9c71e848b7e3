use std::fmt::{self, Write as _};

use summit_context::LabelSet;

use super::format_value;
use crate::{MetricFamily, PointValue};

/// Renders metric families in the text exposition format.
pub fn render_text(families: &[MetricFamily]) -> String {
    let mut buffer = String::new();

    // Writing into a `String` cannot fail.
    let _ = write_text(&mut buffer, families);
    buffer
}

/// Writes metric families in the text exposition format.
///
/// Families without any series are skipped entirely.
pub fn write_text<W: fmt::Write>(writer: &mut W, families: &[MetricFamily]) -> fmt::Result {
    let mut labels_buffer = String::new();

    for family in families {
        if family.points.is_empty() {
            continue;
        }

        if !family.help.is_empty() {
            writeln!(writer, "# HELP {} {}", family.name, escape_help(&family.help))?;
        }
        writeln!(writer, "# TYPE {} {}", family.name, family.metric_type.as_str())?;

        for (labels, value) in family.merged_points() {
            labels_buffer.clear();
            format_labels(&mut labels_buffer, &labels)?;

            match value {
                PointValue::Counter(value) | PointValue::Gauge(value) => {
                    write_line(writer, &family.name, "", &labels_buffer, None, *value)?;
                }
                PointValue::Summary { quantiles, sum, count } => {
                    for (quantile, value) in quantiles {
                        write_line(writer, &family.name, "", &labels_buffer, Some(*quantile), *value)?;
                    }
                    write_line(writer, &family.name, "_sum", &labels_buffer, None, *sum)?;
                    write_line(writer, &family.name, "_count", &labels_buffer, None, *count as f64)?;
                }
            }
        }
    }

    Ok(())
}

fn write_line<W: fmt::Write>(
    writer: &mut W, name: &str, suffix: &str, labels: &str, quantile: Option<f64>, value: f64,
) -> fmt::Result {
    write!(writer, "{}{}", name, suffix)?;

    match (labels.is_empty(), quantile) {
        (true, None) => {}
        (false, None) => write!(writer, "{{{}}}", labels)?,
        (true, Some(quantile)) => write!(writer, "{{quantile=\"{}\"}}", quantile)?,
        (false, Some(quantile)) => write!(writer, "{{{},quantile=\"{}\"}}", labels, quantile)?,
    }

    writeln!(writer, " {}", format_value(value))
}

fn format_labels(buffer: &mut String, labels: &LabelSet) -> fmt::Result {
    for (i, (name, value)) in labels.iter().enumerate() {
        if i > 0 {
            buffer.push(',');
        }

        write!(buffer, "{}=\"", name)?;
        for c in value.chars() {
            match c {
                '\\' => buffer.push_str("\\\\"),
                '"' => buffer.push_str("\\\""),
                '\n' => buffer.push_str("\\n"),
                c => buffer.push(c),
            }
        }
        buffer.push('"');
    }

    Ok(())
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MetricPoint, MetricType};

    fn family(name: &str, metric_type: MetricType, base_labels: LabelSet, points: Vec<MetricPoint>) -> MetricFamily {
        MetricFamily {
            name: name.to_string(),
            help: String::new(),
            metric_type,
            base_labels,
            points,
        }
    }

    #[test]
    fn counter_and_gauge() {
        let mut requests = family(
            "requests_total",
            MetricType::Counter,
            LabelSet::from([("service", "api")]),
            vec![MetricPoint {
                labels: LabelSet::from([("code", "200")]),
                value: PointValue::Counter(12.0),
            }],
        );
        requests.help = "Total requests.".to_string();

        let temperature = family(
            "temperature",
            MetricType::Gauge,
            LabelSet::new(),
            vec![MetricPoint {
                labels: LabelSet::new(),
                value: PointValue::Gauge(-3.5),
            }],
        );

        let expected = "# HELP requests_total Total requests.\n\
                        # TYPE requests_total counter\n\
                        requests_total{code=\"200\",service=\"api\"} 12\n\
                        # TYPE temperature gauge\n\
                        temperature -3.5\n";
        assert_eq!(render_text(&[requests, temperature]), expected);
    }

    #[test]
    fn summary() {
        let latency = family(
            "latency_seconds",
            MetricType::Summary,
            LabelSet::new(),
            vec![
                MetricPoint {
                    labels: LabelSet::new(),
                    value: PointValue::Summary {
                        quantiles: vec![(0.5, 0.25), (0.99, f64::NAN)],
                        sum: 1.5,
                        count: 6,
                    },
                },
                MetricPoint {
                    labels: LabelSet::from([("path", "/")]),
                    value: PointValue::Summary {
                        quantiles: vec![(0.5, 1.0)],
                        sum: 1.0,
                        count: 1,
                    },
                },
            ],
        );

        let expected = "# TYPE latency_seconds summary\n\
                        latency_seconds{quantile=\"0.5\"} 0.25\n\
                        latency_seconds{quantile=\"0.99\"} NaN\n\
                        latency_seconds_sum 1.5\n\
                        latency_seconds_count 6\n\
                        latency_seconds{path=\"/\",quantile=\"0.5\"} 1\n\
                        latency_seconds_sum{path=\"/\"} 1\n\
                        latency_seconds_count{path=\"/\"} 1\n";
        assert_eq!(render_text(&[latency]), expected);
    }

    #[test]
    fn escapes_label_values_and_help() {
        let mut escaped = family(
            "escaped",
            MetricType::Gauge,
            LabelSet::new(),
            vec![MetricPoint {
                labels: LabelSet::from([("path", "C:\\tmp\n\"x\"")]),
                value: PointValue::Gauge(1.0),
            }],
        );
        escaped.help = "Line one\nline two.".to_string();

        let expected = "# HELP escaped Line one\\nline two.\n\
                        # TYPE escaped gauge\n\
                        escaped{path=\"C:\\\\tmp\\n\\\"x\\\"\"} 1\n";
        assert_eq!(render_text(&[escaped]), expected);
    }

    #[test]
    fn empty_families_are_skipped() {
        let empty = family("empty", MetricType::Counter, LabelSet::new(), Vec::new());
        assert_eq!(render_text(&[empty]), "");
    }
}
