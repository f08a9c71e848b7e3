use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::signature::{label_values_to_signature, labels_to_signature};

/// Reserved label that carries the name of the metric family a sample belongs to.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A set of labels identifying a metric series.
///
/// Labels are kept sorted by name, so two label sets built from the same pairs in a different order are equal, hash
/// the same, and produce the same [`signature`](LabelSet::signature).
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct LabelSet {
    labels: BTreeMap<String, String>,
}

impl LabelSet {
    /// Creates an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of labels in the set.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if the set contains no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Inserts a label, returning the previous value if the name was already present.
    pub fn insert<N, V>(&mut self, name: N, value: V) -> Option<String>
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.labels.insert(name.into(), value.into())
    }

    /// Adds a label, consuming and returning the set.
    pub fn with_label<N, V>(mut self, name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        self.insert(name, value);
        self
    }

    /// Gets the value of the label with the given name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    /// Removes the label with the given name, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.labels.remove(name)
    }

    /// Returns `true` if a label with the given name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    /// Iterates over the labels in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.labels.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Merges `other` into this set.
    ///
    /// When both sets contain a label with the same name, the value from `other` wins.
    pub fn merge(&mut self, other: &LabelSet) {
        for (name, value) in &other.labels {
            self.labels.insert(name.clone(), value.clone());
        }
    }

    /// Returns a new set containing the labels of `self` overlaid with the labels of `other`.
    pub fn merged(&self, other: &LabelSet) -> LabelSet {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Returns the series signature of this label set.
    ///
    /// See [`labels_to_signature`] for details.
    pub fn signature(&self) -> u64 {
        labels_to_signature(self.iter())
    }

    /// Returns the value-vector signature of this label set.
    ///
    /// See [`label_values_to_signature`] for details.
    pub fn value_signature(&self) -> u64 {
        label_values_to_signature(self.iter())
    }
}

impl<N, V> FromIterator<(N, V)> for LabelSet
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

impl<N, V> Extend<(N, V)> for LabelSet
where
    N: Into<String>,
    V: Into<String>,
{
    fn extend<I: IntoIterator<Item = (N, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.insert(name, value);
        }
    }
}

impl<const N: usize> From<[(&str, &str); N]> for LabelSet {
    fn from(labels: [(&str, &str); N]) -> Self {
        labels.into_iter().collect()
    }
}

impl From<BTreeMap<String, String>> for LabelSet {
    fn from(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={:?}", name, value)?;
        }
        f.write_str("}")
    }
}
