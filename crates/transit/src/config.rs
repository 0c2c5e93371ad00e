//! Index and realtime configuration.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Tuning for index construction and realtime overlay maintenance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct IndexConfig {
    /// Fraction of empty dense stop slots above which a warning is logged.
    pub max_stop_index_hole_ratio: f64,

    /// Build the flex-trip sub-index. Requires the `flex` feature.
    pub flex_enabled: bool,

    /// Drop realtime timetables for past service dates when committing overlays.
    pub purge_expired_realtime_data: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_stop_index_hole_ratio: 0.05,
            flex_enabled: false,
            purge_expired_realtime_data: true,
        }
    }
}
