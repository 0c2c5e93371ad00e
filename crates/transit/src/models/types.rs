//! Core data types and enums for transit data.

use crate::identifiers::*;

// ============================================================================
// Enums
// ============================================================================

/// Mode of transport. Discriminants follow the GTFS basic route types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TransitMode {
    Tram = 0,
    Subway = 1,
    Rail = 2,
    Bus = 3,
    Ferry = 4,
    CableTram = 5,
    AerialLift = 6,
    Funicular = 7,
    Coach = 8,
    Airplane = 9,
}

/// Trip direction (0 = outbound, 1 = inbound per GTFS)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DirectionId {
    Outbound = 0,
    Inbound = 1,
}

/// Boarding or alighting policy at one stop occurrence of a pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PickDrop {
    #[default]
    Scheduled,
    None,
    CallAgency,
    CoordinateWithDriver,
    /// Cancelled by a realtime update.
    Cancelled,
}

impl PickDrop {
    pub fn is_not_routable(&self) -> bool {
        matches!(self, PickDrop::None | PickDrop::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PickDrop::Cancelled)
    }

    pub fn is_routable(&self) -> bool {
        !self.is_not_routable()
    }
}

/// Which side of a stop visit a departure-board query is interested in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ArrivalDeparture {
    Arrivals,
    #[default]
    Departures,
    Both,
}

/// Realtime status of a [`TripTimes`](crate::models::timetable::TripTimes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RealTimeState {
    #[default]
    Scheduled,
    Updated,
    Canceled,
    /// Removed from the timetable entirely, never shown.
    Deleted,
    /// Created by a realtime update, not present in the static schedule.
    Added,
    /// Moved to a different pattern by a realtime update.
    Modified,
}

// ============================================================================
// Data quality
// ============================================================================

/// A non-fatal problem found while loading or indexing data.
#[derive(Clone, Debug, PartialEq)]
pub enum DataQualityIssue {
    /// The dense stop array has more empty slots than the configured ratio allows.
    SparseStopIndex { holes: usize, size: usize },

    /// A feed's calendar has no service dates after the load time.
    NoFutureServiceDates { feed_id: String },
}

impl std::fmt::Display for DataQualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SparseStopIndex { holes, size } => {
                write!(f, "stop index has {holes} empty slots out of {size}")
            }
            Self::NoFutureServiceDates { feed_id } => {
                write!(f, "feed '{feed_id}' has no future service dates")
            }
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransitError {
    #[error("Cannot merge site repositories built from different stop index counters ({0} != {1})")]
    StopIndexCounterMismatch(u64, u64),

    #[error("A realtime source is already attached: '{existing}', refusing '{attempted}'")]
    RealtimeSourceAlreadyAttached { existing: String, attempted: String },

    #[error("Agencies use different time zones {0:?}; configure one explicitly")]
    MultipleTimeZones(Vec<String>),

    #[error("Time zone already initialized to {0}")]
    TimeZoneAlreadyInitialized(String),

    #[error("Schedule index requested while it is being built")]
    IndexBuildInProgress,

    #[error("Trip times for {trip} have {actual} stops, pattern {pattern} has {expected}")]
    PatternMismatch {
        trip: TripId,
        pattern: PatternId,
        expected: usize,
        actual: usize,
    },

    #[error("Request deadline exceeded")]
    Timeout,

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
