//! Fixture builders shared by the unit tests.

use std::sync::Arc;

use chrono::NaiveDate;
use geo::Point;

use crate::config::IndexConfig;
use crate::identifiers::*;
use crate::models::network::{Agency, Route, Trip};
use crate::models::pattern::{StopPattern, TripPattern};
use crate::models::timetable::{Timetable, TripTimes};
use crate::models::types::{DirectionId, PickDrop, TransitMode};
use crate::repository::{SiteRepository, TimetableRepository};
use crate::service_code::ServiceCodeRegistry;

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Hours and minutes since the start of the service day, in seconds.
pub(crate) fn hm(hours: i32, minutes: i32) -> i32 {
    hours * 3600 + minutes * 60
}

pub(crate) struct Fixture {
    agency: Arc<Agency>,
    route: Arc<Route>,
}

impl Fixture {
    /// One Oslo agency with one bus route `metro:r1`.
    pub fn new() -> Self {
        let agency = Arc::new(Agency {
            id: AgencyId::new("metro:agency"),
            name: "Metro".into(),
            time_zone: chrono_tz::Europe::Oslo,
        });
        let route = Self::make_route(&agency, "metro:r1", Vec::new());
        Self { agency, route }
    }

    fn make_route(agency: &Arc<Agency>, id: &str, groups: Vec<GroupOfRoutesId>) -> Arc<Route> {
        Arc::new(Route {
            id: RouteId::new(id),
            agency: agency.clone(),
            mode: TransitMode::Bus,
            short_name: id.rsplit(':').next().unwrap_or(id).into(),
            long_name: format!("Route {id}").into(),
            groups_of_routes: groups,
        })
    }

    pub fn agency(&self) -> Arc<Agency> {
        self.agency.clone()
    }

    pub fn route(&self, id: &str) -> Arc<Route> {
        if self.route.id.as_str() == id {
            return self.route.clone();
        }
        Self::make_route(&self.agency, id, Vec::new())
    }

    pub fn route_in_group(&self, id: &str, group: &str) -> Arc<Route> {
        Self::make_route(&self.agency, id, vec![GroupOfRoutesId::new(group)])
    }

    /// A trip on the default route.
    pub fn trip(&self, id: &str, service_id: &str) -> Arc<Trip> {
        self.trip_on(&self.route, id, service_id)
    }

    pub fn trip_on(&self, route: &Arc<Route>, id: &str, service_id: &str) -> Arc<Trip> {
        Arc::new(Trip {
            id: TripId::new(id),
            route: route.clone(),
            service_id: ServiceId::new(service_id),
            headsign: "Sentrum".into(),
            direction_id: DirectionId::Outbound,
        })
    }

    /// Stops `metro:A` to `metro:D` along a line in central Oslo.
    pub fn site(&self) -> SiteRepository {
        let mut builder = SiteRepository::builder();
        for (i, name) in ["A", "B", "C", "D"].iter().enumerate() {
            let location = Point::new(10.70 + 0.01 * i as f64, 59.91);
            builder.regular_stop(format!("metro:{name}"), name, location).add();
        }
        builder.build()
    }

    /// Repository with the fixture site and agency.
    pub fn repository(&self) -> TimetableRepository {
        let mut repo = TimetableRepository::new(self.site(), IndexConfig::default());
        repo.add_agency(self.agency());
        repo
    }

    pub fn pattern(&self, id: &str, route: &Arc<Route>, stops: &[&str]) -> PatternBuilder<'_> {
        PatternBuilder {
            fixture: self,
            id: PatternId::new(id),
            route: route.clone(),
            stop_pattern: StopPattern::new(stops.iter().map(|s| StopId::new(s)).collect()),
            trips: Vec::new(),
        }
    }
}

pub(crate) struct PatternBuilder<'a> {
    fixture: &'a Fixture,
    id: PatternId,
    route: Arc<Route>,
    stop_pattern: StopPattern,
    trips: Vec<(Arc<Trip>, Vec<(i32, i32)>)>,
}

impl PatternBuilder<'_> {
    /// Add a trip with `(arrival, departure)` offsets per stop.
    pub fn trip(mut self, id: &str, service_id: &str, times: &[(i32, i32)]) -> Self {
        let trip = self.fixture.trip_on(&self.route, id, service_id);
        self.trips.push((trip, times.to_vec()));
        self
    }

    pub fn policies(mut self, stop_pos: usize, pickup: PickDrop, dropoff: PickDrop) -> Self {
        self.stop_pattern = self.stop_pattern.with_occurrence(stop_pos, pickup, dropoff);
        self
    }

    pub fn build(self, repository: &TimetableRepository) -> TripPattern {
        self.build_with(repository.service_codes())
    }

    pub fn build_with(self, registry: &ServiceCodeRegistry) -> TripPattern {
        let trip_times = self
            .trips
            .iter()
            .map(|(trip, times)| {
                let code = registry.code_for(&trip.service_id);
                TripTimes::scheduled(trip.clone(), code, times).unwrap()
            })
            .collect();
        let timetable = Timetable::scheduled(self.id.clone(), trip_times);
        TripPattern::new(self.id, self.route, self.stop_pattern, timetable).unwrap()
    }

    /// A realtime-created copy of the stop sequence, without scheduled trips.
    pub fn build_realtime(self, original: Option<&str>) -> TripPattern {
        TripPattern::realtime(self.id, self.route, self.stop_pattern, original.map(PatternId::new))
    }
}
