//! Label sets and the signatures used to identify metric series.
//!
//! A series is identified by its set of labels: a mapping of label names to label values. Label sets are compared by
//! content, never by insertion order, and are reduced to a 64-bit signature for use as a map key.

mod labels;
pub use self::labels::{LabelSet, METRIC_NAME_LABEL};

mod signature;
pub use self::signature::{label_values_to_signature, labels_to_signature, EMPTY_LABEL_SIGNATURE};
