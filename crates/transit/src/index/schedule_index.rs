//! Cross-reference index over the static schedule graph.
//!
//! Built in one pass over all trip patterns and immutable afterwards. Routes are
//! discovered through their patterns, so a route without patterns is not indexed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use itertools::Itertools;
use tracing::info;

use crate::identifiers::*;
use crate::models::network::*;
use crate::models::pattern::TripPattern;
use crate::models::types::Result;
use crate::repository::TimetableRepository;
use crate::service_code::ServiceCodeRegistry;
use crate::spatial::SpatialStopIndex;

#[cfg(feature = "flex")]
use crate::index::flex::FlexIndex;

pub struct ScheduleIndex {
    agencies: HashMap<AgencyId, Arc<Agency>>,
    routes: HashMap<RouteId, Arc<Route>>,
    trips: HashMap<TripId, Arc<Trip>>,
    patterns: HashMap<PatternId, Arc<TripPattern>>,
    pattern_for_trip: HashMap<TripId, Arc<TripPattern>>,
    patterns_for_route: HashMap<RouteId, Vec<Arc<TripPattern>>>,
    patterns_for_stop: HashMap<StopId, Vec<Arc<TripPattern>>>,
    groups_of_routes: HashMap<GroupOfRoutesId, Arc<GroupOfRoutes>>,
    routes_for_group: HashMap<GroupOfRoutesId, Vec<Arc<Route>>>,
    trips_on_service_date: HashMap<TripOnServiceDateId, Arc<TripOnServiceDate>>,
    trip_on_service_date_by_key: HashMap<(TripId, NaiveDate), Arc<TripOnServiceDate>>,
    end_of_service_date_for_stop: HashMap<StopId, NaiveDate>,
    service_codes: Arc<ServiceCodeRegistry>,
    spatial: SpatialStopIndex,
    #[cfg(feature = "flex")]
    flex: Option<FlexIndex>,
}

impl ScheduleIndex {
    pub fn build(repository: &TimetableRepository) -> Result<Self> {
        info!(patterns = repository.trip_patterns().count(), "Building schedule index");
        let calendar = repository.calendar();

        let agencies: HashMap<AgencyId, Arc<Agency>> = repository
            .agencies()
            .iter()
            .map(|a| (a.id.clone(), a.clone()))
            .collect();

        let mut routes = HashMap::new();
        let mut trips = HashMap::new();
        let mut patterns = HashMap::new();
        let mut pattern_for_trip = HashMap::new();
        let mut patterns_for_route: HashMap<RouteId, Vec<Arc<TripPattern>>> = HashMap::new();
        let mut patterns_for_stop: HashMap<StopId, Vec<Arc<TripPattern>>> = HashMap::new();
        let mut end_of_service_date_for_stop: HashMap<StopId, NaiveDate> = HashMap::new();

        // Sorted so two builds over the same data give identical lists
        let sorted_patterns = repository.trip_patterns().sorted_by(|a, b| a.id.cmp(&b.id));
        for pattern in sorted_patterns {
            patterns.insert(pattern.id.clone(), pattern.clone());
            routes.insert(pattern.route.id.clone(), pattern.route.clone());
            patterns_for_route
                .entry(pattern.route.id.clone())
                .or_default()
                .push(pattern.clone());

            let mut last_service_date: Option<NaiveDate> = None;
            for trip in pattern.scheduled_trips() {
                trips.insert(trip.id.clone(), trip.clone());
                pattern_for_trip.insert(trip.id.clone(), pattern.clone());
                last_service_date = last_service_date.max(calendar.last_service_date(&trip.service_id));
            }

            for stop in pattern.stops().iter().unique() {
                patterns_for_stop.entry(stop.clone()).or_default().push(pattern.clone());
                if let Some(last) = last_service_date {
                    end_of_service_date_for_stop
                        .entry(stop.clone())
                        .and_modify(|d| *d = (*d).max(last))
                        .or_insert(last);
                }
            }
        }

        let groups_of_routes: HashMap<GroupOfRoutesId, Arc<GroupOfRoutes>> = repository
            .groups_of_routes()
            .iter()
            .map(|g| (g.id.clone(), g.clone()))
            .collect();

        let mut routes_for_group: HashMap<GroupOfRoutesId, Vec<Arc<Route>>> = HashMap::new();
        for route in routes.values().sorted_by(|a, b| a.id.cmp(&b.id)) {
            for group in &route.groups_of_routes {
                routes_for_group.entry(group.clone()).or_default().push(route.clone());
            }
        }

        let mut trips_on_service_date = HashMap::new();
        let mut trip_on_service_date_by_key = HashMap::new();
        for trip_on_date in repository.trips_on_service_date() {
            trips_on_service_date.insert(trip_on_date.id.clone(), trip_on_date.clone());
            trip_on_service_date_by_key.insert(
                (trip_on_date.trip.id.clone(), trip_on_date.service_date),
                trip_on_date.clone(),
            );
        }

        let service_codes = repository.service_codes().clone();
        service_codes.index_calendar(calendar);

        let spatial = SpatialStopIndex::build(repository.site(), repository.config());

        #[cfg(feature = "flex")]
        let flex = repository
            .config()
            .flex_enabled
            .then(|| FlexIndex::build(repository.flex_trips(), repository.site()));

        info!(
            routes = routes.len(),
            trips = trips.len(),
            stops = patterns_for_stop.len(),
            "Schedule index built"
        );

        Ok(Self {
            agencies,
            routes,
            trips,
            patterns,
            pattern_for_trip,
            patterns_for_route,
            patterns_for_stop,
            groups_of_routes,
            routes_for_group,
            trips_on_service_date,
            trip_on_service_date_by_key,
            end_of_service_date_for_stop,
            service_codes,
            spatial,
            #[cfg(feature = "flex")]
            flex,
        })
    }

    pub fn agency(&self, id: &AgencyId) -> Option<&Arc<Agency>> {
        self.agencies.get(id)
    }

    pub fn agencies(&self) -> impl Iterator<Item = &Arc<Agency>> {
        self.agencies.values()
    }

    pub fn route(&self, id: &RouteId) -> Option<&Arc<Route>> {
        self.routes.get(id)
    }

    /// Routes served by at least one pattern.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.values()
    }

    pub fn trip(&self, id: &TripId) -> Option<&Arc<Trip>> {
        self.trips.get(id)
    }

    pub fn trips(&self) -> impl Iterator<Item = &Arc<Trip>> {
        self.trips.values()
    }

    pub fn pattern(&self, id: &PatternId) -> Option<&Arc<TripPattern>> {
        self.patterns.get(id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Arc<TripPattern>> {
        self.patterns.values()
    }

    pub fn pattern_for_trip(&self, trip: &TripId) -> Option<&Arc<TripPattern>> {
        self.pattern_for_trip.get(trip)
    }

    pub fn patterns_for_route(&self, route: &RouteId) -> &[Arc<TripPattern>] {
        self.patterns_for_route.get(route).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Patterns calling at the stop, each listed once even when it calls there twice.
    pub fn patterns_for_stop(&self, stop: &StopId) -> &[Arc<TripPattern>] {
        self.patterns_for_stop.get(stop).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn group_of_routes(&self, id: &GroupOfRoutesId) -> Option<&Arc<GroupOfRoutes>> {
        self.groups_of_routes.get(id)
    }

    pub fn routes_for_group_of_routes(&self, group: &GroupOfRoutesId) -> &[Arc<Route>] {
        self.routes_for_group.get(group).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn trip_on_service_date(&self, id: &TripOnServiceDateId) -> Option<&Arc<TripOnServiceDate>> {
        self.trips_on_service_date.get(id)
    }

    pub fn trips_on_service_date(&self) -> impl Iterator<Item = &Arc<TripOnServiceDate>> {
        self.trips_on_service_date.values()
    }

    pub fn trip_on_service_date_for(&self, trip: &TripId, service_date: NaiveDate) -> Option<&Arc<TripOnServiceDate>> {
        self.trip_on_service_date_by_key.get(&(trip.clone(), service_date))
    }

    /// Last date any scheduled trip calling at the stop runs on.
    pub fn end_of_service_date_for_stop(&self, stop: &StopId) -> Option<NaiveDate> {
        self.end_of_service_date_for_stop.get(stop).copied()
    }

    /// Whether any scheduled trip calls at the stop after `date`.
    pub fn has_service_after(&self, stop: &StopId, date: NaiveDate) -> bool {
        self.end_of_service_date_for_stop(stop).is_some_and(|end| end > date)
    }

    pub fn service_codes(&self) -> &Arc<ServiceCodeRegistry> {
        &self.service_codes
    }

    pub fn spatial(&self) -> &SpatialStopIndex {
        &self.spatial
    }

    #[cfg(feature = "flex")]
    pub fn flex(&self) -> Option<&FlexIndex> {
        self.flex.as_ref()
    }
}
