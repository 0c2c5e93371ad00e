//! Core traits for transit entities.
//!
//! These traits define the public interface for transit data.
//! Implementations can be the in-memory index, a request-scoped service, or a test double.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use geo::Point;

use crate::identifiers::*;
use crate::models::pattern::TripPattern;
use crate::models::site::StopLocation;
use crate::models::timetable::Timetable;
use crate::models::types::Result;
use crate::service_code::RunningServices;

// ============================================================================
// Core Entity Traits
// ============================================================================

/// Capabilities shared by every stop location and stop group.
pub trait SiteEntity {
    fn id_str(&self) -> &str;
    fn name(&self) -> &str;
    fn coordinate(&self) -> Point;
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Read access to schedule data with realtime updates applied, as needed by the
/// departure-board query.
///
/// Implementations must give the same answers for the whole lifetime of one value,
/// i.e. be bound to a single realtime overlay.
pub trait TransitProvider: Send + Sync {
    /// Time zone service days are interpreted in.
    fn time_zone(&self) -> Tz;

    fn stop_location(&self, id: &StopId) -> Option<StopLocation>;

    /// Patterns serving the stop, optionally including realtime-created ones.
    fn patterns_for_stop(&self, stop: &StopId, include_realtime: bool) -> Vec<Arc<TripPattern>>;

    /// Realtime timetable for the date if one exists, otherwise the scheduled one.
    fn timetable(&self, pattern: &TripPattern, service_date: NaiveDate) -> Arc<Timetable>;

    /// Pattern a trip was moved to on the date by a realtime update.
    fn new_pattern_for_modified_trip(&self, trip: &TripId, service_date: NaiveDate) -> Option<Arc<TripPattern>>;

    fn service_codes_running_on(&self, service_date: NaiveDate) -> RunningServices;

    /// Cooperative deadline check; returns [`TransitError::Timeout`](crate::models::types::TransitError::Timeout) when exceeded.
    fn check_deadline(&self) -> Result<()>;
}
