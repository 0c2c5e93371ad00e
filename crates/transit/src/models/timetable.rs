//! Trip times and timetables.
//!
//! Both are immutable once built. Realtime changes go through [`TripTimes::updated`]
//! and [`TimetableBuilder`], which always produce new values and leave the originals
//! (possibly shared with a published overlay) untouched.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::identifiers::{PatternId, TripId};
use crate::models::network::Trip;
use crate::models::types::{RealTimeState, Result, TransitError};
use crate::service_code::ServiceCode;

// ============================================================================
// Trip Times
// ============================================================================

/// Arrival and departure offsets of one trip at every stop of its pattern.
///
/// Offsets are seconds since the start of the service day and may exceed 24 hours.
#[derive(Clone, Debug)]
pub struct TripTimes {
    trip: Arc<Trip>,
    service_code: ServiceCode,
    scheduled_arrivals: Arc<[i32]>,
    scheduled_departures: Arc<[i32]>,
    realtime: Option<RealtimeTimes>,
    state: RealTimeState,
}

#[derive(Clone, Debug)]
struct RealtimeTimes {
    arrivals: Vec<i32>,
    departures: Vec<i32>,
    cancelled_stops: Vec<bool>,
}

impl TripTimes {
    /// Build scheduled times from `(arrival, departure)` pairs, one per stop.
    pub fn scheduled(trip: Arc<Trip>, service_code: ServiceCode, stop_times: &[(i32, i32)]) -> Result<Self> {
        for (i, (arrival, departure)) in stop_times.iter().enumerate() {
            if departure < arrival {
                return Err(TransitError::InvalidData(format!(
                    "Trip {} departs before it arrives at stop position {i} ({departure} < {arrival})",
                    trip.id
                )));
            }
        }

        Ok(Self {
            trip,
            service_code,
            scheduled_arrivals: stop_times.iter().map(|(a, _)| *a).collect(),
            scheduled_departures: stop_times.iter().map(|(_, d)| *d).collect(),
            realtime: None,
            state: RealTimeState::Scheduled,
        })
    }

    /// Copy with realtime state changed, used when a trip is added by realtime data.
    pub fn with_state(&self, state: RealTimeState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    pub fn trip(&self) -> &Arc<Trip> {
        &self.trip
    }

    pub fn trip_id(&self) -> &TripId {
        &self.trip.id
    }

    pub fn service_code(&self) -> ServiceCode {
        self.service_code
    }

    pub fn num_stops(&self) -> usize {
        self.scheduled_arrivals.len()
    }

    pub fn state(&self) -> RealTimeState {
        self.state
    }

    pub fn scheduled_arrival(&self, stop_pos: usize) -> i32 {
        self.scheduled_arrivals[stop_pos]
    }

    pub fn scheduled_departure(&self, stop_pos: usize) -> i32 {
        self.scheduled_departures[stop_pos]
    }

    /// Realtime arrival if updated, otherwise scheduled.
    pub fn arrival(&self, stop_pos: usize) -> i32 {
        match &self.realtime {
            Some(rt) => rt.arrivals[stop_pos],
            None => self.scheduled_arrivals[stop_pos],
        }
    }

    /// Realtime departure if updated, otherwise scheduled.
    pub fn departure(&self, stop_pos: usize) -> i32 {
        match &self.realtime {
            Some(rt) => rt.departures[stop_pos],
            None => self.scheduled_departures[stop_pos],
        }
    }

    pub fn arrival_delay(&self, stop_pos: usize) -> i32 {
        self.arrival(stop_pos) - self.scheduled_arrival(stop_pos)
    }

    pub fn departure_delay(&self, stop_pos: usize) -> i32 {
        self.departure(stop_pos) - self.scheduled_departure(stop_pos)
    }

    pub fn is_cancelled_stop(&self, stop_pos: usize) -> bool {
        self.realtime
            .as_ref()
            .map(|rt| rt.cancelled_stops[stop_pos])
            .unwrap_or(false)
    }

    pub fn is_canceled(&self) -> bool {
        self.state == RealTimeState::Canceled
    }

    pub fn is_deleted(&self) -> bool {
        self.state == RealTimeState::Deleted
    }

    pub fn is_canceled_or_deleted(&self) -> bool {
        self.is_canceled() || self.is_deleted()
    }

    pub fn is_realtime_updated(&self) -> bool {
        self.state != RealTimeState::Scheduled
    }

    /// Start a realtime copy of these times.
    pub fn updated(&self) -> TripTimesUpdate {
        let realtime = self.realtime.clone().unwrap_or_else(|| RealtimeTimes {
            arrivals: self.scheduled_arrivals.to_vec(),
            departures: self.scheduled_departures.to_vec(),
            cancelled_stops: vec![false; self.num_stops()],
        });
        let state = match self.state {
            RealTimeState::Scheduled => RealTimeState::Updated,
            other => other,
        };
        TripTimesUpdate {
            base: self.clone(),
            realtime,
            state,
        }
    }

    /// Apply a uniform delay in seconds to every stop.
    ///
    /// Returns `Err` if the delay would push a time before the start of service.
    pub fn with_delay(&self, delay_seconds: i32) -> Result<Self> {
        let mut update = self.updated();
        for pos in 0..self.num_stops() {
            let arrival = self.arrival(pos) + delay_seconds;
            let departure = self.departure(pos) + delay_seconds;
            if arrival < 0 {
                return Err(TransitError::InvalidData(format!(
                    "Delay of {delay_seconds}s would move trip {} before start of service",
                    self.trip.id
                )));
            }
            update = update.arrival(pos, arrival).departure(pos, departure);
        }
        update.build()
    }

    pub fn canceled(&self) -> Self {
        Self {
            state: RealTimeState::Canceled,
            ..self.clone()
        }
    }

    pub fn deleted(&self) -> Self {
        Self {
            state: RealTimeState::Deleted,
            ..self.clone()
        }
    }
}

/// Builder for a realtime copy of [`TripTimes`].
#[derive(Debug)]
pub struct TripTimesUpdate {
    base: TripTimes,
    realtime: RealtimeTimes,
    state: RealTimeState,
}

impl TripTimesUpdate {
    pub fn arrival(mut self, stop_pos: usize, seconds: i32) -> Self {
        self.realtime.arrivals[stop_pos] = seconds;
        self
    }

    pub fn departure(mut self, stop_pos: usize, seconds: i32) -> Self {
        self.realtime.departures[stop_pos] = seconds;
        self
    }

    pub fn cancel_stop(mut self, stop_pos: usize) -> Self {
        self.realtime.cancelled_stops[stop_pos] = true;
        self
    }

    pub fn state(mut self, state: RealTimeState) -> Self {
        self.state = state;
        self
    }

    /// Finish the update. The times must not decrease along the trip; realtime
    /// updates can reorder trips within a timetable, never stops within a trip.
    pub fn build(self) -> Result<TripTimes> {
        let rt = &self.realtime;
        let mut previous = i32::MIN;
        for pos in 0..rt.arrivals.len() {
            if rt.arrivals[pos] < previous || rt.departures[pos] < rt.arrivals[pos] {
                return Err(TransitError::InvalidData(format!(
                    "Non-increasing realtime times for trip {} at stop position {pos}",
                    self.base.trip.id
                )));
            }
            previous = rt.departures[pos];
        }

        Ok(TripTimes {
            realtime: Some(self.realtime),
            state: self.state,
            ..self.base
        })
    }
}

// ============================================================================
// Timetable
// ============================================================================

/// Trip times of one pattern, either the scheduled set (no service date) or a
/// realtime copy valid for one service date.
#[derive(Clone, Debug)]
pub struct Timetable {
    pattern_id: PatternId,
    service_date: Option<NaiveDate>,
    trip_times: Vec<Arc<TripTimes>>,
}

impl Timetable {
    pub fn scheduled(pattern_id: PatternId, trip_times: Vec<TripTimes>) -> Self {
        Self {
            pattern_id,
            service_date: None,
            trip_times: trip_times.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn pattern_id(&self) -> &PatternId {
        &self.pattern_id
    }

    pub fn service_date(&self) -> Option<NaiveDate> {
        self.service_date
    }

    /// A scheduled timetable is valid for every date.
    pub fn is_valid_for(&self, date: NaiveDate) -> bool {
        self.service_date.map_or(true, |d| d == date)
    }

    pub fn trip_times(&self) -> &[Arc<TripTimes>] {
        &self.trip_times
    }

    pub fn trip_times_for(&self, trip_id: &TripId) -> Option<&Arc<TripTimes>> {
        self.trip_times.iter().find(|t| t.trip_id() == trip_id)
    }

    pub fn is_empty(&self) -> bool {
        self.trip_times.is_empty()
    }

    /// Copy-on-write builder bound to one service date.
    pub fn copy_for_service_date(&self, date: NaiveDate) -> TimetableBuilder {
        TimetableBuilder {
            pattern_id: self.pattern_id.clone(),
            service_date: date,
            trip_times: self.trip_times.clone(),
        }
    }
}

#[derive(Debug)]
pub struct TimetableBuilder {
    pattern_id: PatternId,
    service_date: NaiveDate,
    trip_times: Vec<Arc<TripTimes>>,
}

impl TimetableBuilder {
    /// Replace the times for the same trip, or append them.
    pub fn add_or_update_trip_times(mut self, trip_times: TripTimes) -> Self {
        let trip_times = Arc::new(trip_times);
        match self
            .trip_times
            .iter()
            .position(|t| t.trip_id() == trip_times.trip_id())
        {
            Some(pos) => self.trip_times[pos] = trip_times,
            None => self.trip_times.push(trip_times),
        }
        self
    }

    pub fn remove_trip_times(mut self, trip_id: &TripId) -> Self {
        self.trip_times.retain(|t| t.trip_id() != trip_id);
        self
    }

    pub fn build(self) -> Timetable {
        Timetable {
            pattern_id: self.pattern_id,
            service_date: Some(self.service_date),
            trip_times: self.trip_times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn times() -> TripTimes {
        let fixture = Fixture::new();
        let trip = fixture.trip("t1", "weekday");
        TripTimes::scheduled(trip, ServiceCode(0), &[(1000, 1020), (1600, 1620)]).unwrap()
    }

    #[test]
    fn test_trip_times_delay() {
        let times = times();

        let delayed = times.with_delay(300).unwrap();
        assert_eq!(delayed.arrival(0), 1300);
        assert_eq!(delayed.departure(1), 1920);
        assert_eq!(delayed.scheduled_departure(1), 1620);
        assert_eq!(delayed.departure_delay(1), 300);
        assert_eq!(delayed.state(), RealTimeState::Updated);

        // The original is untouched
        assert_eq!(times.arrival(0), 1000);
        assert!(!times.is_realtime_updated());

        // Moving before the start of service is rejected
        assert!(times.with_delay(-2000).is_err());
    }

    #[test]
    fn test_non_increasing_update_rejected() {
        let times = times();
        let result = times.updated().arrival(1, 900).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_cancel_stop() {
        let times = times().updated().cancel_stop(1).build().unwrap();
        assert!(!times.is_cancelled_stop(0));
        assert!(times.is_cancelled_stop(1));
        assert!(times.canceled().is_canceled_or_deleted());
    }

    #[test]
    fn test_timetable_copy_on_write() {
        let scheduled = Timetable::scheduled(PatternId::new("p1"), vec![times()]);
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();

        let delayed = scheduled.trip_times()[0].with_delay(60).unwrap();
        let updated = scheduled.copy_for_service_date(date).add_or_update_trip_times(delayed).build();

        assert_eq!(updated.trip_times().len(), 1);
        assert_eq!(updated.trip_times()[0].arrival(0), 1060);
        assert_eq!(scheduled.trip_times()[0].arrival(0), 1000);
        assert!(updated.is_valid_for(date));
        assert!(!updated.is_valid_for(date.succ_opt().unwrap()));
        assert!(scheduled.is_valid_for(date));

        let removed = updated
            .copy_for_service_date(date)
            .remove_trip_times(&TripId::new("t1"))
            .build();
        assert!(removed.is_empty());
    }
}
