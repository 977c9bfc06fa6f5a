//! Aggregation of repeated benchmark runs.

use actor_bench_core::{Error, MetricKind, MetricSet, Result};

/// Combine comparable metric sets into one.
///
/// Every metric is reduced with [`MetricKind::reduce`] (the mean, unless the
/// kind says otherwise). The result carries the metadata of the first set.
///
/// # Errors
///
/// - [`Error::InvalidInput`] when `sets` is empty
/// - [`Error::IncompatibleInputs`] when any set's metadata is not compatible
///   with the first one
pub fn aggregate<K: MetricKind>(sets: &[MetricSet<K>]) -> Result<MetricSet<K>> {
    let (first, rest) = sets
        .split_first()
        .ok_or_else(|| Error::invalid_input("No benchmarks passed"))?;

    for (offset, set) in rest.iter().enumerate() {
        if let Some(field) = first.metadata().first_difference(set.metadata()) {
            return Err(Error::IncompatibleInputs {
                index: offset + 1,
                field,
            });
        }
    }

    let values = K::METRICS
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let column: Vec<f64> = sets.iter().map(|set| set.values()[index]).collect();
            K::reduce(name, &column)
        })
        .collect();

    MetricSet::from_values(first.metadata().clone(), values)
}
