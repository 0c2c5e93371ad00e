//! Network entities: agencies, routes, trips.

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::identifiers::*;
use crate::models::types::{DirectionId, TransitMode};

#[derive(Clone, Debug)]
pub struct Agency {
    pub id: AgencyId,
    pub name: Arc<str>,
    pub time_zone: Tz,
}

/// A transit route (e.g., "Red Line", "Route 66")
#[derive(Clone, Debug)]
pub struct Route {
    pub id: RouteId,
    pub agency: Arc<Agency>,
    pub mode: TransitMode,
    /// Short name (e.g., "1", "A", "Red")
    pub short_name: Arc<str>,
    /// Long name (e.g., "Broadway-7th Ave Local")
    pub long_name: Arc<str>,
    pub groups_of_routes: Vec<GroupOfRoutesId>,
}

#[derive(Clone, Debug)]
pub struct GroupOfRoutes {
    pub id: GroupOfRoutesId,
    pub name: Arc<str>,
}

/// A single vehicle run belonging to one route and one service-id.
#[derive(Clone, Debug)]
pub struct Trip {
    pub id: TripId,
    pub route: Arc<Route>,
    pub service_id: ServiceId,
    /// Display name (e.g., "Downtown", "To City Center")
    pub headsign: Arc<str>,
    pub direction_id: DirectionId,
}

/// A trip bound to one service date, optionally replacing other dated trips.
#[derive(Clone, Debug)]
pub struct TripOnServiceDate {
    pub id: TripOnServiceDateId,
    pub trip: Arc<Trip>,
    pub service_date: NaiveDate,
    pub replacement_for: Vec<TripOnServiceDateId>,
}

/// A pre-computed walking transfer between two stops.
#[derive(Clone, Debug, PartialEq)]
pub struct PathTransfer {
    pub from: StopId,
    pub to: StopId,
    pub distance_m: f64,
}

/// Free-text notice attached to an entity by its id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub text: Arc<str>,
}

/// A demand-responsive trip serving stop locations without fixed times.
#[derive(Clone, Debug)]
pub struct FlexTrip {
    pub trip: Arc<Trip>,
    pub stops: Vec<StopId>,
}

impl FlexTrip {
    pub fn id(&self) -> &TripId {
        &self.trip.id
    }
}
