use std::{num::NonZeroUsize, sync::Arc};

use summit_context::LabelSet;
use summit_core::{
    bucket::{AccumulatingBucketBuilder, EvictNewest, TallyingBucketBuilder, UniformEstimator},
    exposition::{render_json, render_text, ExpositionFormat, TEXT_CONTENT_TYPE},
    registry::Registry,
    Counter, Gauge, Metric as _, PointValue, Summary, SummaryOptions,
};

fn registry_with_metrics() -> (Registry, Arc<Summary>, Arc<Counter>, Arc<Gauge>) {
    let registry = Registry::new();

    let capacity = NonZeroUsize::new(100).unwrap();
    let summary = Arc::new(Summary::new(
        SummaryOptions::new(AccumulatingBucketBuilder::new(EvictNewest, capacity)).with_quantiles([0.5, 0.9]),
    ));
    let counter = Arc::new(Counter::new());
    let gauge = Arc::new(Gauge::new());

    let base_labels = LabelSet::from([("instance", "local")]);
    registry
        .register("rpc_latency_ms", "RPC latency.", base_labels.clone(), summary.clone())
        .unwrap();
    registry
        .register("rpc_calls_total", "RPC calls.", base_labels.clone(), counter.clone())
        .unwrap();
    registry
        .register("rpc_in_flight", "In-flight RPCs.", base_labels, gauge.clone())
        .unwrap();

    (registry, summary, counter, gauge)
}

#[test]
fn text_exposition_of_all_metric_types() {
    let (registry, summary, counter, gauge) = registry_with_metrics();
    let labels = LabelSet::from([("service", "users")]);

    for i in 1..=10 {
        summary.observe(&labels, i as f64);
        counter.increment(&labels);
    }
    gauge.set(&labels, 2.0);

    let rendered = render_text(&registry.gather());
    let expected = "# HELP rpc_calls_total RPC calls.\n\
                    # TYPE rpc_calls_total counter\n\
                    rpc_calls_total{instance=\"local\",service=\"users\"} 10\n\
                    # HELP rpc_in_flight In-flight RPCs.\n\
                    # TYPE rpc_in_flight gauge\n\
                    rpc_in_flight{instance=\"local\",service=\"users\"} 2\n\
                    # HELP rpc_latency_ms RPC latency.\n\
                    # TYPE rpc_latency_ms summary\n\
                    rpc_latency_ms{instance=\"local\",service=\"users\",quantile=\"0.5\"} 5\n\
                    rpc_latency_ms{instance=\"local\",service=\"users\",quantile=\"0.9\"} 9\n\
                    rpc_latency_ms_sum{instance=\"local\",service=\"users\"} 55\n\
                    rpc_latency_ms_count{instance=\"local\",service=\"users\"} 10\n";
    assert_eq!(rendered, expected);
    assert_eq!(ExpositionFormat::Text.content_type(), TEXT_CONTENT_TYPE);
}

#[test]
fn json_exposition_round_trips_through_serde() {
    let (registry, summary, _, _) = registry_with_metrics();
    summary.observe(&LabelSet::new(), 4.0);

    let rendered = render_json(&registry.gather()).unwrap();
    let entities: serde_json::Value = serde_json::from_str(&rendered).unwrap();

    let latency = entities
        .as_array()
        .unwrap()
        .iter()
        .find(|entity| entity["baseLabels"]["name"] == "rpc_latency_ms")
        .unwrap();
    assert_eq!(latency["metric"]["type"], "histogram");
    assert_eq!(latency["metric"]["value"][0]["value"]["0.5"], 4.0);
}

#[test]
fn overflowing_bucket_keeps_observation_count() {
    let capacity = NonZeroUsize::new(5).unwrap();
    let summary = Summary::new(SummaryOptions::new(AccumulatingBucketBuilder::new(EvictNewest, capacity)));
    let labels = LabelSet::new();

    for value in 0..=5 {
        summary.observe(&labels, value as f64);
    }

    assert_eq!(summary.observations(&labels), 6);
    match &summary.collect()[0].value {
        PointValue::Summary { count, sum, .. } => {
            assert_eq!(*count, 6);
            assert_eq!(*sum, 15.0);
        }
        other => panic!("unexpected point value: {:?}", other),
    }
}

#[test]
fn tallying_summary_reset_yields_nan() {
    let summary = Summary::new(SummaryOptions::new(TallyingBucketBuilder::new(UniformEstimator)));
    let labels = LabelSet::from([("shard", "0")]);
    for value in [0.0, 50.0, 100.0] {
        summary.observe(&labels, value);
    }
    assert_eq!(summary.quantile(&labels, 0.0), 0.0);
    assert_eq!(summary.quantile(&labels, 1.0), 100.0);

    summary.reset(&labels);
    assert_eq!(summary.observations(&labels), 0);
    assert!(summary.quantile(&labels, 0.5).is_nan());
}
