//! Metric registration and collection.

use std::{
    collections::BTreeMap,
    sync::{Arc, RwLock},
};

use snafu::Snafu;
use summit_context::LabelSet;
use tracing::debug;

use crate::{Metric, MetricFamily};

/// Registry error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum RegistryError {
    /// The metric name does not match `[a-zA-Z_:][a-zA-Z0-9_:]*`.
    #[snafu(display("invalid metric name '{}'", name))]
    InvalidName { name: String },

    /// A base label name does not match `[a-zA-Z_][a-zA-Z0-9_]*`, or uses the reserved `__` prefix.
    #[snafu(display("invalid label name '{}' for metric '{}'", label, name))]
    InvalidLabelName { name: String, label: String },

    /// A metric with the same name is already registered.
    #[snafu(display("metric '{}' is already registered", name))]
    AlreadyRegistered { name: String },
}

struct Registration {
    help: String,
    base_labels: LabelSet,
    metric: Arc<dyn Metric>,
}

/// A set of named metrics.
///
/// There is no process-wide default registry: callers create one and hand it to whatever exposes the metrics.
#[derive(Default)]
pub struct Registry {
    registrations: RwLock<BTreeMap<String, Registration>>,
}

impl Registry {
    /// Creates a new, empty `Registry`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a metric under the given name.
    ///
    /// `base_labels` are attached to every series of the metric when it is gathered.
    ///
    /// # Errors
    ///
    /// If the name or any base label name is invalid, or if a metric with the same name is already registered, an
    /// error is returned.
    pub fn register<N, H>(
        &self, name: N, help: H, base_labels: LabelSet, metric: Arc<dyn Metric>,
    ) -> Result<(), RegistryError>
    where
        N: Into<String>,
        H: Into<String>,
    {
        let name = name.into();
        if !is_valid_metric_name(&name) {
            return Err(RegistryError::InvalidName { name });
        }

        if let Some((label, _)) = base_labels.iter().find(|(label, _)| !is_valid_label_name(label)) {
            return Err(RegistryError::InvalidLabelName {
                label: label.to_string(),
                name,
            });
        }

        let mut registrations = self.registrations.write().unwrap();
        if registrations.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered { name });
        }

        debug!(metric_name = %name, metric_type = metric.metric_type().as_str(), "Registered metric.");
        registrations.insert(
            name,
            Registration {
                help: help.into(),
                base_labels,
                metric,
            },
        );

        Ok(())
    }

    /// Unregisters the metric with the given name.
    ///
    /// Returns `true` if a metric was registered under that name.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.registrations.write().unwrap().remove(name).is_some();
        if removed {
            debug!(metric_name = name, "Unregistered metric.");
        }
        removed
    }

    /// Returns `true` if a metric is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.registrations.read().unwrap().contains_key(name)
    }

    /// Collects every registered metric, in name order.
    pub fn gather(&self) -> Vec<MetricFamily> {
        let registrations = self.registrations.read().unwrap();
        registrations
            .iter()
            .map(|(name, registration)| MetricFamily {
                name: name.clone(),
                help: registration.help.clone(),
                metric_type: registration.metric.metric_type(),
                base_labels: registration.base_labels.clone(),
                points: registration.metric.collect(),
            })
            .collect()
    }

    /// Drops every series of every registered metric.
    pub fn reset_all(&self) {
        let registrations = self.registrations.read().unwrap();
        for registration in registrations.values() {
            registration.metric.reset_all();
        }
    }
}

/// Returns `true` if `name` is a valid metric name.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        // Matches a regular expression of [a-zA-Z_:][a-zA-Z0-9_:]*.
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    }
}

/// Returns `true` if `name` is a valid label name that is not reserved.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }

    let mut chars = name.chars();
    match chars.next() {
        // Matches a regular expression of [a-zA-Z_][a-zA-Z0-9_]*.
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}
