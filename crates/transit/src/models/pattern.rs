//! Stop patterns and trip patterns.

use std::sync::Arc;

use crate::identifiers::{PatternId, StopId};
use crate::models::network::{Route, Trip};
use crate::models::timetable::Timetable;
use crate::models::types::{PickDrop, Result, TransitError, TransitMode};

/// Ordered stops with the boarding policy at each occurrence.
///
/// The same stop may occur more than once (loops); occurrences are independent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopPattern {
    stops: Vec<StopId>,
    pickups: Vec<PickDrop>,
    dropoffs: Vec<PickDrop>,
}

impl StopPattern {
    /// All occurrences allow boarding and alighting.
    pub fn new(stops: Vec<StopId>) -> Self {
        let n = stops.len();
        Self {
            stops,
            pickups: vec![PickDrop::Scheduled; n],
            dropoffs: vec![PickDrop::Scheduled; n],
        }
    }

    pub fn with_policies(stops: Vec<StopId>, pickups: Vec<PickDrop>, dropoffs: Vec<PickDrop>) -> Result<Self> {
        if pickups.len() != stops.len() || dropoffs.len() != stops.len() {
            return Err(TransitError::InvalidData(format!(
                "Stop pattern has {} stops but {} pickups and {} dropoffs",
                stops.len(),
                pickups.len(),
                dropoffs.len()
            )));
        }
        Ok(Self { stops, pickups, dropoffs })
    }

    pub fn stops(&self) -> &[StopId] {
        &self.stops
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn pickup(&self, stop_pos: usize) -> PickDrop {
        self.pickups[stop_pos]
    }

    pub fn dropoff(&self, stop_pos: usize) -> PickDrop {
        self.dropoffs[stop_pos]
    }

    /// Copy with one occurrence's policies replaced.
    pub fn with_occurrence(&self, stop_pos: usize, pickup: PickDrop, dropoff: PickDrop) -> Self {
        let mut copy = self.clone();
        copy.pickups[stop_pos] = pickup;
        copy.dropoffs[stop_pos] = dropoff;
        copy
    }
}

/// A stop sequence shared by trips of one route, with its scheduled timetable.
#[derive(Clone, Debug)]
pub struct TripPattern {
    pub id: PatternId,
    pub route: Arc<Route>,
    pub mode: TransitMode,
    pub stop_pattern: StopPattern,
    scheduled_timetable: Arc<Timetable>,
    /// Set for patterns created by the realtime updater. These only live in overlays.
    pub created_by_realtime: bool,
    /// For realtime-created patterns, the scheduled pattern they were derived from.
    pub original_pattern: Option<PatternId>,
}

impl TripPattern {
    /// Fails with [`TransitError::PatternMismatch`] when a trip's stop count differs
    /// from the stop pattern.
    pub fn new(id: PatternId, route: Arc<Route>, stop_pattern: StopPattern, scheduled_timetable: Timetable) -> Result<Self> {
        if let Some(times) = scheduled_timetable
            .trip_times()
            .iter()
            .find(|t| t.num_stops() != stop_pattern.len())
        {
            return Err(TransitError::PatternMismatch {
                trip: times.trip_id().clone(),
                pattern: id,
                expected: stop_pattern.len(),
                actual: times.num_stops(),
            });
        }
        Ok(Self::assemble(id, route, stop_pattern, scheduled_timetable, None))
    }

    /// A pattern created by the realtime updater, e.g. for a rerouted or added trip.
    /// Its scheduled timetable is empty; all its times live in overlay timetables.
    pub fn realtime(id: PatternId, route: Arc<Route>, stop_pattern: StopPattern, original_pattern: Option<PatternId>) -> Self {
        let empty = Timetable::scheduled(id.clone(), Vec::new());
        Self {
            created_by_realtime: true,
            ..Self::assemble(id, route, stop_pattern, empty, original_pattern)
        }
    }

    fn assemble(
        id: PatternId,
        route: Arc<Route>,
        stop_pattern: StopPattern,
        scheduled_timetable: Timetable,
        original_pattern: Option<PatternId>,
    ) -> Self {
        Self {
            id,
            mode: route.mode,
            route,
            stop_pattern,
            scheduled_timetable: Arc::new(scheduled_timetable),
            created_by_realtime: false,
            original_pattern,
        }
    }

    pub fn scheduled_timetable(&self) -> &Arc<Timetable> {
        &self.scheduled_timetable
    }

    pub fn stops(&self) -> &[StopId] {
        self.stop_pattern.stops()
    }

    pub fn num_stops(&self) -> usize {
        self.stop_pattern.len()
    }

    pub fn feed_id(&self) -> &str {
        self.id.feed_id()
    }

    /// Trips of the scheduled timetable.
    pub fn scheduled_trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.scheduled_timetable.trip_times().iter().map(|t| t.trip())
    }

    /// Every position at which the stop occurs.
    pub fn positions_of<'a>(&'a self, stop: &'a StopId) -> impl Iterator<Item = usize> + 'a {
        self.stops()
            .iter()
            .enumerate()
            .filter(move |(_, s)| *s == stop)
            .map(|(pos, _)| pos)
    }

    pub fn can_board(&self, stop_pos: usize) -> bool {
        self.stop_pattern.pickup(stop_pos).is_routable()
    }

    pub fn can_alight(&self, stop_pos: usize) -> bool {
        self.stop_pattern.dropoff(stop_pos).is_routable()
    }

    pub fn is_cancelled_stop(&self, stop_pos: usize) -> bool {
        self.stop_pattern.pickup(stop_pos).is_cancelled() || self.stop_pattern.dropoff(stop_pos).is_cancelled()
    }

    pub fn contains_trip(&self, trip: &Trip) -> bool {
        self.scheduled_timetable.trip_times_for(&trip.id).is_some()
    }
}
