//! Single-writer staging area for realtime changes.
//!
//! The updater applies trip updates to an [`OverlayBuffer`] and periodically
//! commits it into a new immutable [`RealtimeOverlay`]. Timetables are copied on
//! write, so committed overlays never change after publication.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::config::IndexConfig;
use crate::identifiers::{PatternId, TripId};
use crate::models::network::{Route, TripOnServiceDate};
use crate::models::pattern::TripPattern;
use crate::models::timetable::{Timetable, TripTimes};
use crate::models::types::{Result, TransitError};
use crate::realtime::overlay::RealtimeOverlay;

/// One realtime change to a trip on a service date.
#[derive(Debug)]
pub struct RealTimeTripUpdate {
    pub pattern: Arc<TripPattern>,
    pub service_date: NaiveDate,
    pub trip_times: TripTimes,
    /// Register the pattern's route as added by realtime data.
    pub creates_route: bool,
    /// Register the trip as added by realtime data.
    pub creates_trip: bool,
    pub trip_on_service_date: Option<Arc<TripOnServiceDate>>,
}

impl RealTimeTripUpdate {
    pub fn new(pattern: Arc<TripPattern>, service_date: NaiveDate, trip_times: TripTimes) -> Self {
        Self {
            pattern,
            service_date,
            trip_times,
            creates_route: false,
            creates_trip: false,
            trip_on_service_date: None,
        }
    }

    pub fn creating_route(mut self) -> Self {
        self.creates_route = true;
        self
    }

    pub fn creating_trip(mut self) -> Self {
        self.creates_trip = true;
        self
    }

    pub fn with_trip_on_service_date(mut self, trip_on_date: Arc<TripOnServiceDate>) -> Self {
        self.trip_on_service_date = Some(trip_on_date);
        self
    }
}

#[derive(Debug)]
pub struct OverlayBuffer {
    working: RealtimeOverlay,
    dirty: bool,
    purge_expired: bool,
}

impl OverlayBuffer {
    pub fn new(config: &IndexConfig) -> Self {
        Self {
            working: RealtimeOverlay::empty(),
            dirty: false,
            purge_expired: config.purge_expired_realtime_data,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Apply new trip times to the pattern's timetable for the service date.
    ///
    /// Realtime-created patterns are recorded as the trip's pattern for that date.
    /// An update on a scheduled pattern returns the trip to it.
    pub fn update(&mut self, update: RealTimeTripUpdate) -> Result<()> {
        let RealTimeTripUpdate {
            pattern,
            service_date,
            trip_times,
            creates_route,
            creates_trip,
            trip_on_service_date,
        } = update;

        if trip_times.num_stops() != pattern.num_stops() {
            return Err(TransitError::PatternMismatch {
                trip: trip_times.trip_id().clone(),
                pattern: pattern.id.clone(),
                expected: pattern.num_stops(),
                actual: trip_times.num_stops(),
            });
        }

        let trip_id = trip_times.trip_id().clone();
        let trip = trip_times.trip().clone();
        let key = (trip_id.clone(), service_date);

        // A trip moved to a different realtime pattern leaves the previous one
        if let Some(previous) = self.working.new_patterns_for_modified_trips.get(&key).cloned() {
            if previous.id != pattern.id {
                self.remove_trip_times(&previous.id, service_date, &trip_id);
            }
        }

        let current = self.working.resolve_timetable(&pattern, service_date);
        let updated = current
            .copy_for_service_date(service_date)
            .add_or_update_trip_times(trip_times)
            .build();
        self.store_timetable(updated);

        if pattern.created_by_realtime {
            self.working
                .new_patterns_for_modified_trips
                .insert(key, pattern.clone());
            self.working
                .added_patterns
                .insert(pattern.id.clone(), pattern.clone());
            for stop in pattern.stops() {
                let patterns = self.working.patterns_for_stop.entry(stop.clone()).or_default();
                if !patterns.iter().any(|p| p.id == pattern.id) {
                    patterns.push(pattern.clone());
                }
            }
        } else {
            self.working.new_patterns_for_modified_trips.remove(&key);
        }

        if creates_route {
            let route: Arc<Route> = pattern.route.clone();
            self.working.added_routes.insert(route.id.clone(), route);
        }

        if creates_trip {
            self.working.added_trips.insert(trip_id.clone(), trip);
            self.working
                .added_pattern_for_trip
                .insert(trip_id.clone(), pattern.clone());
            self.working
                .added_patterns
                .insert(pattern.id.clone(), pattern.clone());
            let for_route = self
                .working
                .added_patterns_for_route
                .entry(pattern.route.id.clone())
                .or_default();
            if !for_route.iter().any(|p| p.id == pattern.id) {
                for_route.push(pattern.clone());
            }
        }

        if let Some(trip_on_date) = trip_on_service_date {
            self.working
                .added_trip_on_service_date_by_key
                .insert((trip_on_date.trip.id.clone(), trip_on_date.service_date), trip_on_date.clone());
            self.working
                .added_trips_on_service_date
                .insert(trip_on_date.id.clone(), trip_on_date);
        }

        self.dirty = true;
        Ok(())
    }

    /// Undo a reroute of the trip on the date. Returns whether anything changed.
    pub fn revert_trip_to_scheduled_pattern(&mut self, trip: &TripId, service_date: NaiveDate) -> bool {
        let key = (trip.clone(), service_date);
        let Some(pattern) = self.working.new_patterns_for_modified_trips.remove(&key) else {
            return false;
        };
        self.remove_trip_times(&pattern.id, service_date, trip);
        self.dirty = true;
        true
    }

    /// Drop every realtime change belonging to the feed. Returns whether anything
    /// changed.
    pub fn clear_feed(&mut self, feed_id: &str) -> bool {
        let w = &mut self.working;
        let before = Self::size_of(w);

        w.timetables.retain(|pattern, _| pattern.feed_id() != feed_id);
        w.new_patterns_for_modified_trips
            .retain(|(trip, _), _| trip.feed_id() != feed_id);
        for patterns in w.patterns_for_stop.values_mut() {
            patterns.retain(|p| p.feed_id() != feed_id);
        }
        w.patterns_for_stop.retain(|_, patterns| !patterns.is_empty());
        w.added_routes.retain(|id, _| id.feed_id() != feed_id);
        w.added_trips.retain(|id, _| id.feed_id() != feed_id);
        w.added_pattern_for_trip.retain(|id, _| id.feed_id() != feed_id);
        w.added_patterns_for_route.retain(|id, _| id.feed_id() != feed_id);
        w.added_patterns.retain(|id, _| id.feed_id() != feed_id);
        w.added_trips_on_service_date
            .retain(|id, _| id.feed_id() != feed_id);
        w.added_trip_on_service_date_by_key
            .retain(|(trip, _), _| trip.feed_id() != feed_id);

        let changed = Self::size_of(w) != before;
        if changed {
            debug!(feed_id, "Cleared realtime data for feed");
            self.dirty = true;
        }
        changed
    }

    /// Drop timetables and reroutes for service dates before yesterday. Returns
    /// whether anything changed.
    pub fn purge_expired_data(&mut self, today: NaiveDate) -> bool {
        let cutoff = today - Duration::days(1);
        let w = &mut self.working;
        let before = Self::size_of(w);

        for timetables in w.timetables.values_mut() {
            timetables.retain(|t| t.service_date().map_or(true, |d| d >= cutoff));
        }
        w.timetables.retain(|_, timetables| !timetables.is_empty());
        w.new_patterns_for_modified_trips
            .retain(|(_, date), _| *date >= cutoff);
        w.added_trips_on_service_date
            .retain(|_, t| t.service_date >= cutoff);
        w.added_trip_on_service_date_by_key
            .retain(|(_, date), _| *date >= cutoff);

        let changed = Self::size_of(w) != before;
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Freeze the buffer into a new overlay. `None` when nothing changed since the
    /// last commit, unless forced.
    pub fn commit(&mut self, force: bool) -> Option<Arc<RealtimeOverlay>> {
        if !self.dirty && !force {
            return None;
        }
        let overlay = Arc::new(self.working.clone());
        self.dirty = false;
        debug!(
            timetables = overlay.timetables.values().map(Vec::len).sum::<usize>(),
            modified_trips = overlay.new_patterns_for_modified_trips.len(),
            added_trips = overlay.added_trips.len(),
            "Committed realtime overlay"
        );
        Some(overlay)
    }

    /// Commit after purging expired data, when configured to purge.
    pub fn commit_at(&mut self, today: NaiveDate, force: bool) -> Option<Arc<RealtimeOverlay>> {
        if self.purge_expired {
            self.purge_expired_data(today);
        }
        self.commit(force)
    }

    fn store_timetable(&mut self, timetable: Timetable) {
        let timetables = self
            .working
            .timetables
            .entry(timetable.pattern_id().clone())
            .or_default();
        let timetable = Arc::new(timetable);
        match timetables.binary_search_by_key(&timetable.service_date(), |t| t.service_date()) {
            Ok(i) => timetables[i] = timetable,
            Err(i) => timetables.insert(i, timetable),
        }
    }

    fn remove_trip_times(&mut self, pattern: &PatternId, service_date: NaiveDate, trip: &TripId) {
        let Some(current) = self.working.realtime_timetable(pattern, service_date).cloned() else {
            return;
        };
        let updated = current
            .copy_for_service_date(service_date)
            .remove_trip_times(trip)
            .build();
        self.store_timetable(updated);
    }

    fn size_of(w: &RealtimeOverlay) -> usize {
        w.timetables.values().map(Vec::len).sum::<usize>()
            + w.new_patterns_for_modified_trips.len()
            + w.patterns_for_stop.values().map(Vec::len).sum::<usize>()
            + w.added_routes.len()
            + w.added_trips.len()
            + w.added_pattern_for_trip.len()
            + w.added_patterns_for_route.values().map(Vec::len).sum::<usize>()
            + w.added_patterns.len()
            + w.added_trips_on_service_date.len()
    }
}
