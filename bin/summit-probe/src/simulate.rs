use std::sync::Arc;

use rand::{rngs::StdRng, Rng as _, SeedableRng as _};
use rand_distr::{Distribution as _, Pareto};
use summit_config::GenericConfiguration;
use summit_context::LabelSet;
use summit_core::{
    config::SummaryConfiguration, exposition::ExpositionFormat, registry::Registry, Counter, Summary, SummaryOptions,
};
use summit_error::{ErrorContext as _, GenericError};
use tracing::info;

use crate::config::SimulateConfig;

const LATENCY_METRIC: &str = "simulated_request_latency_ms";
const REQUESTS_METRIC: &str = "simulated_requests_total";

/// Simulated endpoints, with the scale (minimum latency, in milliseconds) of their latency distribution.
const ENDPOINTS: [(&str, f64); 3] = [("/api/users", 5.0), ("/api/orders", 20.0), ("/healthz", 1.0)];

/// Shape of every latency distribution. Smaller values give heavier tails.
const LATENCY_SHAPE: f64 = 1.5;

/// Runs a simulation and prints the resulting exposition to standard output.
pub fn handle_simulate(config: SimulateConfig, configuration: &GenericConfiguration) -> Result<(), GenericError> {
    let summary_config = configuration
        .try_get_typed::<SummaryConfiguration>("summary")?
        .unwrap_or_default();

    let simulation = Simulation::run(config.count, config.seed, &summary_config)?;
    for labels in &simulation.series {
        let requests = simulation.requests.value(labels).unwrap_or_default();
        match simulation.latency.quantile_with_confidence(labels, 0.5) {
            Some(estimate) => info!(
                series = %labels,
                requests,
                median = estimate.value,
                lower = estimate.lower,
                upper = estimate.upper,
                coverage = estimate.coverage,
                samples = estimate.samples,
                "Estimated median latency."
            ),
            // Buckets that keep no raw samples cannot bound their estimates.
            None => info!(
                series = %labels,
                requests,
                median = simulation.latency.quantile(labels, 0.5),
                "Estimated median latency."
            ),
        }
    }

    let rendered = ExpositionFormat::from(config.format)
        .render(&simulation.registry.gather())
        .error_context("Failed to render exposition.")?;
    print!("{}", rendered);

    Ok(())
}

/// A registry populated with synthetic request latencies.
struct Simulation {
    registry: Registry,
    latency: Arc<Summary>,
    requests: Arc<Counter>,
    series: Vec<LabelSet>,
}

impl Simulation {
    fn run(count: usize, seed: Option<u64>, summary_config: &SummaryConfiguration) -> Result<Self, GenericError> {
        let options = SummaryOptions::from_configuration(summary_config).error_context("Invalid summary configuration.")?;
        let latency = Arc::new(Summary::new(options));
        let requests = Arc::new(Counter::new());

        let registry = Registry::new();
        let base_labels = LabelSet::from([("source", "simulation")]);
        registry.register(
            LATENCY_METRIC,
            "Synthetic request latency, in milliseconds.",
            base_labels.clone(),
            latency.clone(),
        )?;
        registry.register(
            REQUESTS_METRIC,
            "Synthetic requests issued.",
            base_labels,
            requests.clone(),
        )?;

        let mut distributions = Vec::with_capacity(ENDPOINTS.len());
        for (endpoint, scale) in ENDPOINTS {
            let distribution = Pareto::new(scale, LATENCY_SHAPE)
                .with_error_context(|| format!("Invalid latency distribution for '{}'.", endpoint))?;
            distributions.push((LabelSet::from([("endpoint", endpoint)]), distribution));
        }

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };

        for _ in 0..count {
            let (labels, distribution) = &distributions[rng.random_range(0..distributions.len())];
            latency.observe(labels, distribution.sample(&mut rng));
            requests.increment(labels);
        }

        info!(observations = count, series = latency.series_count(), "Simulation complete.");

        Ok(Self {
            registry,
            latency,
            requests,
            series: distributions.into_iter().map(|(labels, _)| labels).collect(),
        })
    }
}
