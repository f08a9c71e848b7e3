use std::{collections::HashMap, sync::RwLock};

use summit_context::LabelSet;

struct LabeledValue {
    labels: LabelSet,
    value: f64,
}

/// Scalar values keyed by the signature of their labels.
#[derive(Default)]
pub(crate) struct LabeledValues {
    values: RwLock<HashMap<u64, LabeledValue>>,
}

impl LabeledValues {
    pub fn update<F>(&self, labels: &LabelSet, update: F)
    where
        F: FnOnce(f64) -> f64,
    {
        let mut values = self.values.write().unwrap();
        let entry = values.entry(labels.signature()).or_insert_with(|| LabeledValue {
            labels: labels.clone(),
            value: 0.0,
        });
        entry.value = update(entry.value);
    }

    pub fn get(&self, labels: &LabelSet) -> Option<f64> {
        let values = self.values.read().unwrap();
        values.get(&labels.signature()).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.values.write().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<(LabelSet, f64)> {
        let values = self.values.read().unwrap();
        let mut snapshot = values
            .values()
            .map(|entry| (entry.labels.clone(), entry.value))
            .collect::<Vec<_>>();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }
}
