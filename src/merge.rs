//! Incremental merge of metrics overviews
//!
//! When a user is re-polled, the stored overview and the overview computed
//! from the new records are averaged key by key: `(old + new) / 2`. The merge
//! is not weighted by how many sessions each side summarizes, so folding a
//! sequence of overviews depends on its order. A key with no samples in the
//! new records keeps its stored value.

use crate::error::ComputeError;
use crate::types::{MetricKey, MetricsOverview, SampledOverview};

/// Average a stored overview with a freshly computed one
pub fn merge_overviews<K: MetricKey>(
    stored: &MetricsOverview<K>,
    fresh: &MetricsOverview<K>,
) -> Result<MetricsOverview<K>, ComputeError> {
    MetricsOverview::try_from_fn(|key| Ok((stored.get(key)? + fresh.get(key)?) / 2.0))
}

/// Fold a poll's sampled overview into an optional prior.
///
/// Returns the prior unchanged when no key had samples. Without a prior,
/// keys lacking samples start at 0.
pub fn merge_sampled<K: MetricKey>(
    prior: Option<&MetricsOverview<K>>,
    fresh: &SampledOverview<K>,
) -> Result<Option<MetricsOverview<K>>, ComputeError> {
    if !fresh.has_samples() {
        return Ok(prior.cloned());
    }
    let Some(stored) = prior else {
        return Ok(Some(fresh.to_overview()));
    };
    MetricsOverview::try_from_fn(|key| {
        let old = stored.get(key)?;
        Ok(fresh.get(key).map_or(old, |new| (old + new) / 2.0))
    })
    .map(Some)
}
