//! Overview normalization
//!
//! This module rescales a metrics overview into [0, 1] with min-max scaling
//! across the overview's own values:
//! - The smallest value maps to 0, the largest to 1
//! - A single-key overview, or one whose values are all equal, maps every key to 0
//! - Non-finite values map to 0, so the output never holds NaN

use crate::types::{MetricKey, MetricsOverview, NormalizedMetrics};

/// Normalizer for converting metrics overviews to normalized metrics
pub struct Normalizer;

impl Normalizer {
    /// Normalize an overview
    pub fn normalize<K: MetricKey>(overview: &MetricsOverview<K>) -> NormalizedMetrics<K> {
        let finite = || overview.iter().map(|(_, v)| v).filter(|v| v.is_finite());
        let min = finite().fold(f64::INFINITY, f64::min);
        let max = finite().fold(f64::NEG_INFINITY, f64::max);
        let spread = max - min;

        // A single-metric domain has no range to scale over; no current domain has one
        let degenerate = overview.len() < 2 || !spread.is_finite() || spread <= 0.0;

        NormalizedMetrics::from_values(
            overview
                .iter()
                .map(|(key, value)| {
                    let scaled = if degenerate || !value.is_finite() {
                        0.0
                    } else {
                        ((value - min) / spread).clamp(0.0, 1.0)
                    };
                    (key, scaled)
                })
                .collect(),
        )
    }
}
