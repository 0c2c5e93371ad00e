//! The static schedule graph and its lazily built [`ScheduleIndex`].
//!
//! Mutations take `&mut self`, so they can never race with readers holding
//! `&self`. Every structural mutation drops the index; the next call to
//! [`TimetableRepository::schedule_index`] rebuilds it synchronously.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::identifiers::*;
use crate::index::ScheduleIndex;
use crate::models::calendar::CalendarServiceData;
use crate::models::network::*;
use crate::models::pattern::TripPattern;
use crate::models::time::start_of_service;
use crate::models::types::{DataQualityIssue, Result, TransitError, TransitMode};
use crate::repository::SiteRepository;
use crate::service_code::{ServiceCode, ServiceCodeRegistry};

enum IndexState {
    Absent,
    Building(ThreadId),
    Ready(Arc<ScheduleIndex>),
}

struct IndexSlot {
    state: Mutex<IndexState>,
    built: Condvar,
}

impl Default for IndexSlot {
    fn default() -> Self {
        Self {
            state: Mutex::new(IndexState::Absent),
            built: Condvar::new(),
        }
    }
}

/// Leaves the slot `Ready` when an index was produced, `Absent` otherwise, even when
/// the build unwinds. Wakes waiting readers either way.
struct BuildGuard<'a> {
    slot: &'a IndexSlot,
    built: Option<Arc<ScheduleIndex>>,
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        *state = match self.built.take() {
            Some(index) => IndexState::Ready(index),
            None => IndexState::Absent,
        };
        self.slot.built.notify_all();
    }
}

pub struct TimetableRepository {
    site: SiteRepository,
    agencies: Vec<Arc<Agency>>,
    groups_of_routes: Vec<Arc<GroupOfRoutes>>,
    trip_patterns: HashMap<PatternId, Arc<TripPattern>>,
    trips_on_service_date: HashMap<TripOnServiceDateId, Arc<TripOnServiceDate>>,
    transfers_by_stop: HashMap<StopId, Vec<PathTransfer>>,
    notices_by_element: HashMap<String, Vec<Arc<Notice>>>,
    flex_trips: HashMap<TripId, Arc<FlexTrip>>,
    transit_modes: HashSet<TransitMode>,
    calendar: CalendarServiceData,
    service_codes: Arc<ServiceCodeRegistry>,
    time_zone: Option<Tz>,
    time_zone_explicit: bool,
    service_starts: Option<DateTime<Utc>>,
    service_ends: Option<DateTime<Utc>>,
    issues: Vec<DataQualityIssue>,
    config: IndexConfig,
    index: IndexSlot,
}

impl TimetableRepository {
    pub fn new(site: SiteRepository, config: IndexConfig) -> Self {
        Self {
            site,
            agencies: Vec::new(),
            groups_of_routes: Vec::new(),
            trip_patterns: HashMap::new(),
            trips_on_service_date: HashMap::new(),
            transfers_by_stop: HashMap::new(),
            notices_by_element: HashMap::new(),
            flex_trips: HashMap::new(),
            transit_modes: HashSet::new(),
            calendar: CalendarServiceData::new(),
            service_codes: Arc::new(ServiceCodeRegistry::new()),
            time_zone: None,
            time_zone_explicit: false,
            service_starts: None,
            service_ends: None,
            issues: Vec::new(),
            config,
            index: IndexSlot::default(),
        }
    }

    // ========================================================================
    // Index lifecycle
    // ========================================================================

    /// The index for the current contents, building it first if needed.
    ///
    /// When another thread is building, waits for it. Calling this from inside the
    /// build on the same thread is a wiring bug and returns
    /// [`TransitError::IndexBuildInProgress`].
    pub fn schedule_index(&self) -> Result<Arc<ScheduleIndex>> {
        let current = thread::current().id();
        let mut state = self.index.state.lock();
        loop {
            let builder = match &*state {
                IndexState::Ready(index) => return Ok(index.clone()),
                IndexState::Absent => None,
                IndexState::Building(builder) => Some(*builder),
            };
            match builder {
                None => break,
                Some(builder) if builder == current => return Err(TransitError::IndexBuildInProgress),
                Some(_) => self.index.built.wait(&mut state),
            }
        }
        *state = IndexState::Building(current);
        drop(state);

        let mut guard = BuildGuard {
            slot: &self.index,
            built: None,
        };
        self.validate_time_zones()?;
        let index = Arc::new(ScheduleIndex::build(self)?);
        guard.built = Some(index.clone());
        Ok(index)
    }

    pub fn has_index(&self) -> bool {
        matches!(*self.index.state.lock(), IndexState::Ready(_))
    }

    fn invalidate_index(&mut self) {
        let state = self.index.state.get_mut();
        if matches!(state, IndexState::Ready(_)) {
            debug!("Schedule index invalidated");
        }
        *state = IndexState::Absent;
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn merge_site(&mut self, other: SiteRepository) -> Result<()> {
        self.site.merge(other)?;
        self.invalidate_index();
        Ok(())
    }

    /// Add an agency. Until a zone is configured explicitly, the first agency's
    /// zone becomes the repository zone.
    pub fn add_agency(&mut self, agency: Arc<Agency>) {
        if self.time_zone.is_none() {
            debug!(time_zone = %agency.time_zone, "Repository time zone taken from agency {}", agency.id);
            self.time_zone = Some(agency.time_zone);
        }
        self.agencies.push(agency);
        self.invalidate_index();
    }

    pub fn add_group_of_routes(&mut self, group: Arc<GroupOfRoutes>) {
        self.groups_of_routes.push(group);
        self.invalidate_index();
    }

    pub fn add_trip_pattern(&mut self, pattern: TripPattern) -> Arc<TripPattern> {
        let pattern = Arc::new(pattern);
        self.trip_patterns.insert(pattern.id.clone(), pattern.clone());
        self.invalidate_index();
        pattern
    }

    pub fn add_trip_on_service_date(&mut self, trip_on_date: Arc<TripOnServiceDate>) {
        self.trips_on_service_date.insert(trip_on_date.id.clone(), trip_on_date);
        self.invalidate_index();
    }

    pub fn add_transfer(&mut self, transfer: PathTransfer) {
        self.transfers_by_stop.entry(transfer.from.clone()).or_default().push(transfer);
        self.invalidate_index();
    }

    /// Attach notices to the entity with the given id.
    pub fn add_notices(&mut self, element_id: &str, notices: impl IntoIterator<Item = Notice>) {
        self.notices_by_element
            .entry(element_id.to_string())
            .or_default()
            .extend(notices.into_iter().map(Arc::new));
        self.invalidate_index();
    }

    pub fn add_flex_trip(&mut self, flex_trip: FlexTrip) {
        self.flex_trips.insert(flex_trip.id().clone(), Arc::new(flex_trip));
        self.invalidate_index();
    }

    pub fn add_transit_mode(&mut self, mode: TransitMode) {
        self.transit_modes.insert(mode);
        self.invalidate_index();
    }

    /// Add enumerated calendar data and widen the feed validity period to cover it.
    ///
    /// Feeds (by the feed id of their service-ids) without a service day starting
    /// after `now` are recorded as [`DataQualityIssue::NoFutureServiceDates`].
    pub fn update_calendar_service_data(&mut self, data: CalendarServiceData, now: DateTime<Utc>) {
        if self.time_zone.is_none() {
            warn!("Repository contains no agencies yet; service days are interpreted in UTC");
        }
        let zone = self.time_zone();

        let mut feeds = BTreeSet::new();
        let mut feeds_with_future_dates = HashSet::new();
        for service_id in data.service_ids() {
            feeds.insert(service_id.feed_id().to_string());
            for date in data.service_dates_for(service_id) {
                let start = start_of_service(*date, zone);
                if start > now {
                    feeds_with_future_dates.insert(service_id.feed_id().to_string());
                }
                // The feed is unreliable after the end of its last service day
                let end = start + Duration::days(1);
                if self.service_starts.map_or(true, |s| start < s) {
                    self.service_starts = Some(start);
                }
                if self.service_ends.map_or(true, |e| end > e) {
                    self.service_ends = Some(end);
                }
            }
        }

        for feed_id in feeds {
            if !feeds_with_future_dates.contains(&feed_id) {
                let issue = DataQualityIssue::NoFutureServiceDates { feed_id };
                warn!("{issue}");
                self.issues.push(issue);
            }
        }

        self.calendar.merge(data);
        self.invalidate_index();
    }

    /// Set the repository zone explicitly. Agencies may then use other zones.
    pub fn init_time_zone(&mut self, zone: Tz) -> Result<()> {
        if self.time_zone_explicit {
            if let Some(existing) = self.time_zone.filter(|z| *z != zone) {
                return Err(TransitError::TimeZoneAlreadyInitialized(existing.name().to_string()));
            }
        }
        self.time_zone = Some(zone);
        self.time_zone_explicit = true;
        self.invalidate_index();
        Ok(())
    }

    // ========================================================================
    // Service codes and validity
    // ========================================================================

    pub fn service_codes(&self) -> &Arc<ServiceCodeRegistry> {
        &self.service_codes
    }

    pub fn service_code_for(&self, service_id: &ServiceId) -> ServiceCode {
        self.service_codes.code_for(service_id)
    }

    /// Service-id running only on `date`, for trips added by realtime data.
    ///
    /// Returns `None` when the date is outside the feed validity period.
    pub fn get_or_create_service_id_for_date(&self, date: NaiveDate) -> Option<ServiceId> {
        let start = start_of_service(date, self.time_zone());
        if !self.transit_feed_covers(start) {
            return None;
        }

        let service_id = ServiceId::new(format!("realtime-service-{}", date.format("%Y%m%d")));
        let code = self.service_codes.code_for(&service_id);
        self.service_codes.register_running(date, code);
        Some(service_id)
    }

    pub fn transit_service_starts(&self) -> Option<DateTime<Utc>> {
        self.service_starts
    }

    pub fn transit_service_ends(&self) -> Option<DateTime<Utc>> {
        self.service_ends
    }

    pub fn transit_feed_covers(&self, instant: DateTime<Utc>) -> bool {
        match (self.service_starts, self.service_ends) {
            (Some(starts), Some(ends)) => instant >= starts && instant < ends,
            _ => false,
        }
    }

    // ========================================================================
    // Time zone
    // ========================================================================

    /// Zone service days are interpreted in. UTC until an agency or an explicit
    /// zone is added.
    pub fn time_zone(&self) -> Tz {
        self.time_zone.unwrap_or(chrono_tz::UTC)
    }

    /// Agencies must share one zone unless a zone was configured explicitly.
    pub fn validate_time_zones(&self) -> Result<()> {
        if self.time_zone_explicit {
            return Ok(());
        }
        let zones: BTreeSet<&str> = self.agencies.iter().map(|a| a.time_zone.name()).collect();
        if zones.len() > 1 {
            return Err(TransitError::MultipleTimeZones(
                zones.into_iter().map(String::from).collect(),
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn site(&self) -> &SiteRepository {
        &self.site
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn agencies(&self) -> &[Arc<Agency>] {
        &self.agencies
    }

    pub fn groups_of_routes(&self) -> &[Arc<GroupOfRoutes>] {
        &self.groups_of_routes
    }

    pub fn trip_patterns(&self) -> impl Iterator<Item = &Arc<TripPattern>> {
        self.trip_patterns.values()
    }

    pub fn trips_on_service_date(&self) -> impl Iterator<Item = &Arc<TripOnServiceDate>> {
        self.trips_on_service_date.values()
    }

    pub fn transfers_from(&self, stop: &StopId) -> &[PathTransfer] {
        self.transfers_by_stop.get(stop).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn notices_for(&self, element_id: &str) -> &[Arc<Notice>] {
        self.notices_by_element
            .get(element_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn flex_trips(&self) -> impl Iterator<Item = &Arc<FlexTrip>> {
        self.flex_trips.values()
    }

    pub fn transit_modes(&self) -> &HashSet<TransitMode> {
        &self.transit_modes
    }

    pub fn calendar(&self) -> &CalendarServiceData {
        &self.calendar
    }

    pub fn data_quality_issues(&self) -> &[DataQualityIssue] {
        &self.issues
    }
}
