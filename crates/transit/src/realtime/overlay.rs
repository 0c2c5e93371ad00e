//! Frozen realtime view layered over the schedule index.
//!
//! An overlay only holds what realtime data changed or added. Lookups that miss
//! in the overlay fall through to the schedule index.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::identifiers::*;
use crate::models::network::{Route, Trip, TripOnServiceDate};
use crate::models::pattern::TripPattern;
use crate::models::timetable::{Timetable, TripTimes};

#[derive(Clone, Debug, Default)]
pub struct RealtimeOverlay {
    /// Per pattern, realtime timetables sorted by service date.
    pub(crate) timetables: HashMap<PatternId, Vec<Arc<Timetable>>>,
    pub(crate) new_patterns_for_modified_trips: HashMap<(TripId, NaiveDate), Arc<TripPattern>>,
    pub(crate) patterns_for_stop: HashMap<StopId, Vec<Arc<TripPattern>>>,
    pub(crate) added_routes: HashMap<RouteId, Arc<Route>>,
    pub(crate) added_trips: HashMap<TripId, Arc<Trip>>,
    pub(crate) added_pattern_for_trip: HashMap<TripId, Arc<TripPattern>>,
    pub(crate) added_patterns_for_route: HashMap<RouteId, Vec<Arc<TripPattern>>>,
    pub(crate) added_patterns: HashMap<PatternId, Arc<TripPattern>>,
    pub(crate) added_trips_on_service_date: HashMap<TripOnServiceDateId, Arc<TripOnServiceDate>>,
    pub(crate) added_trip_on_service_date_by_key: HashMap<(TripId, NaiveDate), Arc<TripOnServiceDate>>,
}

impl RealtimeOverlay {
    /// An overlay without any realtime changes.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.timetables.is_empty()
            && self.new_patterns_for_modified_trips.is_empty()
            && self.added_trips.is_empty()
            && self.added_routes.is_empty()
            && self.added_trips_on_service_date.is_empty()
    }

    /// The realtime timetable for the pattern on the date, if one was published.
    pub fn realtime_timetable(&self, pattern: &PatternId, service_date: NaiveDate) -> Option<&Arc<Timetable>> {
        let timetables = self.timetables.get(pattern)?;
        timetables
            .binary_search_by_key(&Some(service_date), |t| t.service_date())
            .ok()
            .map(|i| &timetables[i])
    }

    /// Realtime timetable for the date, or the pattern's scheduled timetable.
    pub fn resolve_timetable(&self, pattern: &TripPattern, service_date: NaiveDate) -> Arc<Timetable> {
        self.realtime_timetable(&pattern.id, service_date)
            .unwrap_or_else(|| pattern.scheduled_timetable())
            .clone()
    }

    /// Pattern the trip was moved to on the date, if it was rerouted.
    pub fn new_pattern_for_modified_trip(&self, trip: &TripId, service_date: NaiveDate) -> Option<&Arc<TripPattern>> {
        self.new_patterns_for_modified_trips.get(&(trip.clone(), service_date))
    }

    pub fn has_new_patterns_for_modified_trips(&self) -> bool {
        !self.new_patterns_for_modified_trips.is_empty()
    }

    /// Realtime-created patterns calling at the stop.
    pub fn patterns_for_stop(&self, stop: &StopId) -> &[Arc<TripPattern>] {
        self.patterns_for_stop.get(stop).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn added_route(&self, id: &RouteId) -> Option<&Arc<Route>> {
        self.added_routes.get(id)
    }

    pub fn added_routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.added_routes.values()
    }

    pub fn added_trip(&self, id: &TripId) -> Option<&Arc<Trip>> {
        self.added_trips.get(id)
    }

    pub fn added_trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.added_trips.values()
    }

    pub fn added_pattern(&self, id: &PatternId) -> Option<&Arc<TripPattern>> {
        self.added_patterns.get(id)
    }

    pub fn added_pattern_for_trip(&self, trip: &TripId) -> Option<&Arc<TripPattern>> {
        self.added_pattern_for_trip.get(trip)
    }

    pub fn added_patterns_for_route(&self, route: &RouteId) -> &[Arc<TripPattern>] {
        self.added_patterns_for_route
            .get(route)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn added_trip_on_service_date(&self, id: &TripOnServiceDateId) -> Option<&Arc<TripOnServiceDate>> {
        self.added_trips_on_service_date.get(id)
    }

    pub fn added_trips_on_service_date(&self) -> impl Iterator<Item = &Arc<TripOnServiceDate>> {
        self.added_trips_on_service_date.values()
    }

    pub fn added_trip_on_service_date_for(&self, trip: &TripId, service_date: NaiveDate) -> Option<&Arc<TripOnServiceDate>> {
        self.added_trip_on_service_date_by_key.get(&(trip.clone(), service_date))
    }

    /// Canceled trip times in realtime timetables, by service date then trip id.
    pub fn canceled_trips(&self) -> Vec<(NaiveDate, Arc<TripTimes>)> {
        let mut canceled: Vec<(NaiveDate, Arc<TripTimes>)> = self
            .timetables
            .values()
            .flatten()
            .filter_map(|timetable| timetable.service_date().map(|date| (date, timetable)))
            .flat_map(|(date, timetable)| {
                timetable
                    .trip_times()
                    .iter()
                    .filter(|t| t.is_canceled())
                    .map(move |t| (date, t.clone()))
            })
            .collect();
        canceled.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.trip_id().cmp(b.1.trip_id())));
        canceled
    }
}
