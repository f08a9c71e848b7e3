use std::hash::Hasher as _;

use fnv::FnvHasher;

/// Signature of an empty label set.
///
/// This is the FNV-1a 64-bit offset basis, which is what the hasher produces when no bytes have been written to it.
/// Both [`labels_to_signature`] and [`label_values_to_signature`] return this value for an empty label set.
pub const EMPTY_LABEL_SIGNATURE: u64 = 0xcbf2_9ce4_8422_2325;

/// Computes the signature of a label set.
///
/// Labels are sorted by name, and then, for each label in order, the name bytes followed by the value bytes are fed to
/// an FNV-1a hasher. The order in which labels are provided does not influence the result. No delimiter is written
/// between names and values, so `a="bc"` and `ab="c"` share a signature.
///
/// This is not a cryptographic hash: distinct label sets may collide, although this is unlikely in practice.
pub fn labels_to_signature<I, N, V>(labels: I) -> u64
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: AsRef<str>,
{
    hash_sorted(labels, true)
}

/// Computes the signature of the values of a label set.
///
/// Labels are sorted by name, as with [`labels_to_signature`], but only the value bytes are hashed. This identifies a
/// distinct vector of values regardless of which label names produced it.
pub fn label_values_to_signature<I, N, V>(labels: I) -> u64
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: AsRef<str>,
{
    hash_sorted(labels, false)
}

fn hash_sorted<I, N, V>(labels: I, include_names: bool) -> u64
where
    I: IntoIterator<Item = (N, V)>,
    N: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted = labels.into_iter().collect::<Vec<_>>();
    if sorted.is_empty() {
        return EMPTY_LABEL_SIGNATURE;
    }

    sorted.sort_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));

    let mut hasher = FnvHasher::default();
    for (name, value) in &sorted {
        if include_names {
            hasher.write(name.as_ref().as_bytes());
        }
        hasher.write(value.as_ref().as_bytes());
    }

    hasher.finish()
}
