//! Request-scoped read facade over the schedule index and the realtime overlay.
//!
//! A [`TransitService`] captures the published overlay the first time it needs it
//! and answers every later call from that same overlay, so all answers within one
//! request are consistent even while newer overlays are published.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use chrono_tz::Tz;
use geo::Rect;
use itertools::Itertools;

use crate::identifiers::*;
use crate::index::ScheduleIndex;
use crate::models::network::*;
use crate::models::pattern::TripPattern;
use crate::models::site::{RegularStop, StopLocation};
use crate::models::timetable::{Timetable, TripTimes};
use crate::models::time::start_of_service;
use crate::models::traits::TransitProvider;
use crate::models::types::{Result, TransitError};
use crate::realtime::{OverlayPublisher, RealtimeOverlay};
use crate::repository::TimetableRepository;
use crate::service::departures::TripTimeOnDate;
use crate::service_code::RunningServices;

// ============================================================================
// Deadlines
// ============================================================================

/// Cooperative request deadline, polled between accessor calls.
pub trait DeadlineCheck: Send + Sync {
    fn check(&self) -> Result<()>;
}

/// Never times out.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDeadline;

impl DeadlineCheck for NoDeadline {
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }
}

impl DeadlineCheck for Deadline {
    fn check(&self) -> Result<()> {
        if Instant::now() >= self.at {
            return Err(TransitError::Timeout);
        }
        Ok(())
    }
}

// ============================================================================
// Transit Service
// ============================================================================

pub struct TransitService {
    repository: Arc<TimetableRepository>,
    index: Arc<ScheduleIndex>,
    publisher: Option<Arc<OverlayPublisher>>,
    overlay: OnceLock<Option<Arc<RealtimeOverlay>>>,
    deadline: Arc<dyn DeadlineCheck>,
}

impl TransitService {
    /// Service without realtime data. Builds the schedule index if needed.
    pub fn new(repository: Arc<TimetableRepository>) -> Result<Self> {
        let index = repository.schedule_index()?;
        Ok(Self {
            repository,
            index,
            publisher: None,
            overlay: OnceLock::new(),
            deadline: Arc::new(NoDeadline),
        })
    }

    pub fn with_publisher(mut self, publisher: Arc<OverlayPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_deadline(mut self, deadline: Arc<dyn DeadlineCheck>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The overlay this service is pinned to, captured on first call.
    pub fn overlay(&self) -> Option<&Arc<RealtimeOverlay>> {
        self.overlay
            .get_or_init(|| self.publisher.as_ref().and_then(|p| p.current()))
            .as_ref()
    }

    pub fn schedule_index(&self) -> &Arc<ScheduleIndex> {
        &self.index
    }

    pub fn repository(&self) -> &Arc<TimetableRepository> {
        &self.repository
    }

    // ------------------------------------------------------------------------
    // By id
    // ------------------------------------------------------------------------

    pub fn agency(&self, id: &AgencyId) -> Option<Arc<Agency>> {
        self.index.agency(id).cloned()
    }

    pub fn route(&self, id: &RouteId) -> Option<Arc<Route>> {
        self.overlay()
            .and_then(|o| o.added_route(id))
            .or_else(|| self.index.route(id))
            .cloned()
    }

    pub fn trip(&self, id: &TripId) -> Option<Arc<Trip>> {
        self.overlay()
            .and_then(|o| o.added_trip(id))
            .or_else(|| self.index.trip(id))
            .cloned()
    }

    pub fn pattern(&self, id: &PatternId) -> Option<Arc<TripPattern>> {
        self.overlay()
            .and_then(|o| o.added_pattern(id))
            .or_else(|| self.index.pattern(id))
            .cloned()
    }

    /// Scheduled pattern of a trip, or the pattern of a realtime-added trip.
    pub fn pattern_for_trip(&self, trip: &TripId) -> Option<Arc<TripPattern>> {
        self.overlay()
            .and_then(|o| o.added_pattern_for_trip(trip))
            .or_else(|| self.index.pattern_for_trip(trip))
            .cloned()
    }

    /// Pattern the trip runs on at the date, taking realtime reroutes into account.
    pub fn pattern_for_trip_on_date(&self, trip: &TripId, service_date: NaiveDate) -> Option<Arc<TripPattern>> {
        self.overlay()
            .and_then(|o| o.new_pattern_for_modified_trip(trip, service_date))
            .cloned()
            .or_else(|| self.pattern_for_trip(trip))
    }

    pub fn trip_on_service_date(&self, id: &TripOnServiceDateId) -> Option<Arc<TripOnServiceDate>> {
        self.overlay()
            .and_then(|o| o.added_trip_on_service_date(id))
            .or_else(|| self.index.trip_on_service_date(id))
            .cloned()
    }

    pub fn trip_on_service_date_for(&self, trip: &TripId, service_date: NaiveDate) -> Option<Arc<TripOnServiceDate>> {
        self.overlay()
            .and_then(|o| o.added_trip_on_service_date_for(trip, service_date))
            .or_else(|| self.index.trip_on_service_date_for(trip, service_date))
            .cloned()
    }

    pub fn group_of_routes(&self, id: &GroupOfRoutesId) -> Option<Arc<GroupOfRoutes>> {
        self.index.group_of_routes(id).cloned()
    }

    pub fn stop_location(&self, id: &StopId) -> Option<StopLocation> {
        self.repository.site().stop_location(id)
    }

    pub fn stop_by_index(&self, index: usize) -> Option<StopLocation> {
        self.index.spatial().stop_by_index(index).cloned()
    }

    /// The stop with the id, or every stop below the station or station group with
    /// that id. Empty when neither exists.
    pub fn find_stop_or_child_stops(&self, id: &str) -> Vec<StopLocation> {
        let site = self.repository.site();
        if let Some(stop) = site.stop_location(&StopId::new(id)) {
            return vec![stop];
        }
        site.stop_group(&StationId::new(id))
            .map(|group| site.child_stops_of(&group))
            .unwrap_or_default()
    }

    /// Times at every stop of the trip on the date, taken from the pattern and
    /// timetable it runs on that day.
    pub fn trip_time_on_dates(&self, trip: &TripId, service_date: NaiveDate) -> Option<Vec<TripTimeOnDate>> {
        let pattern = self.pattern_for_trip_on_date(trip, service_date)?;
        let timetable = TransitProvider::timetable(self, &pattern, service_date);
        let trip_times = timetable.trip_times_for(trip)?.clone();
        let day_start = start_of_service(service_date, self.time_zone());

        let times = (0..trip_times.num_stops())
            .map(|pos| TripTimeOnDate::new(trip_times.clone(), pattern.clone(), pos, service_date, day_start))
            .collect();
        Some(times)
    }

    // ------------------------------------------------------------------------
    // Enumerations
    // ------------------------------------------------------------------------

    /// Indexed routes and routes added by realtime data. Routes without any
    /// pattern are not included.
    pub fn all_routes(&self) -> Result<Vec<Arc<Route>>> {
        self.deadline.check()?;
        let added = self.overlay().into_iter().flat_map(|o| o.added_routes());
        Ok(union_by_id(self.index.routes(), added, |r| &r.id))
    }

    pub fn all_trips(&self) -> Result<Vec<Arc<Trip>>> {
        self.deadline.check()?;
        let added = self.overlay().into_iter().flat_map(|o| o.added_trips());
        Ok(union_by_id(self.index.trips(), added, |t| &t.id))
    }

    pub fn patterns_for_route(&self, route: &RouteId) -> Result<Vec<Arc<TripPattern>>> {
        self.deadline.check()?;
        let added = self
            .overlay()
            .into_iter()
            .flat_map(|o| o.added_patterns_for_route(route));
        Ok(union_by_id(self.index.patterns_for_route(route), added, |p| &p.id))
    }

    pub fn routes_for_group_of_routes(&self, group: &GroupOfRoutesId) -> Result<Vec<Arc<Route>>> {
        self.deadline.check()?;
        Ok(self.index.routes_for_group_of_routes(group).to_vec())
    }

    /// Routes with a pattern calling at the stop, realtime-created patterns included.
    pub fn routes_for_stop(&self, stop: &StopId) -> Result<Vec<Arc<Route>>> {
        self.deadline.check()?;
        let routes = TransitProvider::patterns_for_stop(self, stop, true)
            .into_iter()
            .map(|p| p.route.clone())
            .unique_by(|r| r.id.clone())
            .sorted_by(|a, b| a.id.cmp(&b.id))
            .collect();
        Ok(routes)
    }

    pub fn all_trips_on_service_date(&self) -> Result<Vec<Arc<TripOnServiceDate>>> {
        self.deadline.check()?;
        let added = self
            .overlay()
            .into_iter()
            .flat_map(|o| o.added_trips_on_service_date());
        Ok(union_by_id(self.index.trips_on_service_date(), added, |t| &t.id))
    }

    /// Canceled trips of the pinned overlay, by service date.
    pub fn canceled_trips(&self) -> Result<Vec<(NaiveDate, Arc<TripTimes>)>> {
        self.deadline.check()?;
        Ok(self.overlay().map(|o| o.canceled_trips()).unwrap_or_default())
    }

    pub fn find_regular_stops(&self, bbox: &Rect) -> Result<Vec<Arc<RegularStop>>> {
        self.deadline.check()?;
        Ok(self.index.spatial().find_regular_stops(bbox))
    }

    pub fn has_new_patterns_for_modified_trips(&self) -> bool {
        self.overlay().is_some_and(|o| o.has_new_patterns_for_modified_trips())
    }

    pub fn transfers_from(&self, stop: &StopId) -> &[PathTransfer] {
        self.repository.transfers_from(stop)
    }

    pub fn notices_for(&self, element_id: &str) -> &[Arc<Notice>] {
        self.repository.notices_for(element_id)
    }
}

/// Indexed entities followed by added ones whose id the index does not know.
fn union_by_id<'a, T: 'a, K: Eq + std::hash::Hash + Clone + Ord + 'a>(
    indexed: impl IntoIterator<Item = &'a Arc<T>>,
    added: impl IntoIterator<Item = &'a Arc<T>>,
    id: impl Fn(&T) -> &K,
) -> Vec<Arc<T>> {
    let mut seen = HashSet::new();
    indexed
        .into_iter()
        .chain(added)
        .filter(|e| seen.insert(id(e).clone()))
        .cloned()
        .sorted_by(|a, b| id(a).cmp(id(b)))
        .collect()
}

impl TransitProvider for TransitService {
    fn time_zone(&self) -> Tz {
        self.repository.time_zone()
    }

    fn stop_location(&self, id: &StopId) -> Option<StopLocation> {
        TransitService::stop_location(self, id)
    }

    fn patterns_for_stop(&self, stop: &StopId, include_realtime: bool) -> Vec<Arc<TripPattern>> {
        let indexed = self.index.patterns_for_stop(stop);
        let added: &[Arc<TripPattern>] = match self.overlay() {
            Some(o) if include_realtime => o.patterns_for_stop(stop),
            _ => &[],
        };
        union_by_id(indexed, added, |p| &p.id)
    }

    fn timetable(&self, pattern: &TripPattern, service_date: NaiveDate) -> Arc<Timetable> {
        match self.overlay() {
            Some(o) => o.resolve_timetable(pattern, service_date),
            None => pattern.scheduled_timetable().clone(),
        }
    }

    fn new_pattern_for_modified_trip(&self, trip: &TripId, service_date: NaiveDate) -> Option<Arc<TripPattern>> {
        self.overlay()
            .and_then(|o| o.new_pattern_for_modified_trip(trip, service_date))
            .cloned()
    }

    fn service_codes_running_on(&self, service_date: NaiveDate) -> RunningServices {
        self.index.service_codes().codes_running_on(service_date)
    }

    fn check_deadline(&self) -> Result<()> {
        self.deadline.check()
    }
}
