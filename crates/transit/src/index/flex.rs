//! Lookup tables for demand-responsive trips.

use std::collections::HashMap;
use std::sync::Arc;

use itertools::Itertools;

use crate::identifiers::{RouteId, StopId, TripId};
use crate::models::network::FlexTrip;
use crate::models::site::StopLocation;
use crate::repository::SiteRepository;

#[derive(Debug, Default)]
pub struct FlexIndex {
    trips: HashMap<TripId, Arc<FlexTrip>>,
    trips_for_route: HashMap<RouteId, Vec<Arc<FlexTrip>>>,
    trips_for_stop: HashMap<StopId, Vec<Arc<FlexTrip>>>,
}

impl FlexIndex {
    /// A trip serving a group stop is also listed under each of the group's members.
    pub fn build<'a>(flex_trips: impl Iterator<Item = &'a Arc<FlexTrip>>, site: &SiteRepository) -> Self {
        let mut index = Self::default();
        for flex_trip in flex_trips.sorted_by(|a, b| a.id().cmp(b.id())) {
            index.trips.insert(flex_trip.id().clone(), flex_trip.clone());
            index
                .trips_for_route
                .entry(flex_trip.trip.route.id.clone())
                .or_default()
                .push(flex_trip.clone());

            let served = flex_trip.stops.iter().flat_map(|stop| match site.stop_location(stop) {
                Some(group @ StopLocation::Group(_)) => {
                    let mut ids = group.child_stops();
                    ids.push(stop.clone());
                    ids
                }
                _ => vec![stop.clone()],
            });
            for stop in served.unique() {
                index.trips_for_stop.entry(stop).or_default().push(flex_trip.clone());
            }
        }
        index
    }

    pub fn flex_trip(&self, id: &TripId) -> Option<&Arc<FlexTrip>> {
        self.trips.get(id)
    }

    pub fn flex_trips(&self) -> impl Iterator<Item = &Arc<FlexTrip>> {
        self.trips.values()
    }

    pub fn flex_trips_for_route(&self, route: &RouteId) -> &[Arc<FlexTrip>] {
        self.trips_for_route.get(route).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn flex_trips_for_stop(&self, stop: &StopId) -> &[Arc<FlexTrip>] {
        self.trips_for_stop.get(stop).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
