//! Arena of stop locations and stop groups.
//!
//! Every stop location gets a dense integer index from a [`StopIndexCounter`] when it
//! is created. Indexes are never reused: a stop replaced during a merge leaves an
//! empty slot behind. Repositories can only be merged when they were built from the
//! same counter, otherwise their indexes would collide.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use geo::{Point, Polygon};
use tracing::debug;

use crate::identifiers::{StationId, StopId};
use crate::models::site::*;
use crate::models::types::{Result, TransitError, TransitMode};

static NEXT_COUNTER_ROOT: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Stop Index Counter
// ============================================================================

/// Source of dense stop indexes. Clones share the same sequence.
#[derive(Clone, Debug)]
pub struct StopIndexCounter {
    root: u64,
    next: Arc<AtomicUsize>,
}

impl StopIndexCounter {
    pub fn new() -> Self {
        Self {
            root: NEXT_COUNTER_ROOT.fetch_add(1, Ordering::Relaxed),
            next: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Identity of the sequence, shared by all clones.
    pub fn root(&self) -> u64 {
        self.root
    }

    pub fn next_index(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of indexes handed out so far.
    pub fn size(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for StopIndexCounter {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Site Repository
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct SiteRepository {
    counter: StopIndexCounter,
    regular_stops: HashMap<StopId, Arc<RegularStop>>,
    area_stops: HashMap<StopId, Arc<AreaStop>>,
    group_stops: HashMap<StopId, Arc<GroupStop>>,
    stations: HashMap<StationId, Arc<Station>>,
    multi_modal_stations: HashMap<StationId, Arc<MultiModalStation>>,
    groups_of_stations: HashMap<StationId, Arc<GroupOfStations>>,
}

impl SiteRepository {
    pub fn builder() -> SiteRepositoryBuilder {
        SiteRepositoryBuilder::new(StopIndexCounter::new())
    }

    pub fn counter(&self) -> &StopIndexCounter {
        &self.counter
    }

    /// Size of the dense stop index space, including empty slots.
    pub fn stop_index_size(&self) -> usize {
        self.counter.size()
    }

    pub fn stop_location(&self, id: &StopId) -> Option<StopLocation> {
        if let Some(stop) = self.regular_stops.get(id) {
            return Some(StopLocation::Regular(stop.clone()));
        }
        if let Some(stop) = self.area_stops.get(id) {
            return Some(StopLocation::Area(stop.clone()));
        }
        self.group_stops.get(id).map(|g| StopLocation::Group(g.clone()))
    }

    pub fn regular_stop(&self, id: &StopId) -> Option<Arc<RegularStop>> {
        self.regular_stops.get(id).cloned()
    }

    pub fn area_stop(&self, id: &StopId) -> Option<Arc<AreaStop>> {
        self.area_stops.get(id).cloned()
    }

    pub fn station(&self, id: &StationId) -> Option<Arc<Station>> {
        self.stations.get(id).cloned()
    }

    pub fn multi_modal_station(&self, id: &StationId) -> Option<Arc<MultiModalStation>> {
        self.multi_modal_stations.get(id).cloned()
    }

    pub fn group_of_stations(&self, id: &StationId) -> Option<Arc<GroupOfStations>> {
        self.groups_of_stations.get(id).cloned()
    }

    pub fn stop_group(&self, id: &StationId) -> Option<StopGroup> {
        if let Some(s) = self.stations.get(id) {
            return Some(StopGroup::Station(s.clone()));
        }
        if let Some(s) = self.multi_modal_stations.get(id) {
            return Some(StopGroup::MultiModal(s.clone()));
        }
        self.groups_of_stations
            .get(id)
            .map(|g| StopGroup::GroupOfStations(g.clone()))
    }

    pub fn regular_stops(&self) -> impl Iterator<Item = &Arc<RegularStop>> {
        self.regular_stops.values()
    }

    pub fn area_stops(&self) -> impl Iterator<Item = &Arc<AreaStop>> {
        self.area_stops.values()
    }

    pub fn stations(&self) -> impl Iterator<Item = &Arc<Station>> {
        self.stations.values()
    }

    pub fn multi_modal_stations(&self) -> impl Iterator<Item = &Arc<MultiModalStation>> {
        self.multi_modal_stations.values()
    }

    pub fn stop_locations(&self) -> Vec<StopLocation> {
        self.regular_stops
            .values()
            .map(|s| StopLocation::Regular(s.clone()))
            .chain(self.area_stops.values().map(|s| StopLocation::Area(s.clone())))
            .chain(self.group_stops.values().map(|s| StopLocation::Group(s.clone())))
            .collect()
    }

    /// All stop locations below a group, descending through child stations.
    pub fn child_stops_of(&self, group: &StopGroup) -> Vec<StopLocation> {
        match group {
            StopGroup::Station(station) => station
                .child_stops
                .iter()
                .filter_map(|id| self.stop_location(id))
                .collect(),
            other => other
                .child_stations()
                .iter()
                .filter_map(|id| self.stop_group(id))
                .flat_map(|child| self.child_stops_of(&child))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regular_stops.is_empty() && self.area_stops.is_empty() && self.group_stops.is_empty()
    }

    /// Merge another repository into this one. Entities with the same id are replaced
    /// by the incoming ones; the replaced stops' index slots become holes.
    pub fn merge(&mut self, other: SiteRepository) -> Result<()> {
        if other.counter.root() != self.counter.root() {
            return Err(TransitError::StopIndexCounterMismatch(
                self.counter.root(),
                other.counter.root(),
            ));
        }
        debug!(
            regular_stops = other.regular_stops.len(),
            stations = other.stations.len(),
            "Merging site repository"
        );
        self.regular_stops.extend(other.regular_stops);
        self.area_stops.extend(other.area_stops);
        self.group_stops.extend(other.group_stops);
        self.stations.extend(other.stations);
        self.multi_modal_stations.extend(other.multi_modal_stations);
        self.groups_of_stations.extend(other.groups_of_stations);
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Debug)]
pub struct SiteRepositoryBuilder {
    repository: SiteRepository,
}

impl SiteRepositoryBuilder {
    pub fn new(counter: StopIndexCounter) -> Self {
        Self {
            repository: SiteRepository {
                counter,
                ..SiteRepository::default()
            },
        }
    }

    /// Start a regular stop. Its index is reserved immediately.
    pub fn regular_stop(&mut self, id: impl Into<StopId>, name: &str, location: Point) -> RegularStopBuilder<'_> {
        let index = self.repository.counter.next_index();
        RegularStopBuilder {
            parent: self,
            stop: RegularStop {
                id: id.into(),
                name: name.into(),
                location,
                index,
                parent_station: None,
                mode: None,
            },
        }
    }

    pub fn area_stop(&mut self, id: impl Into<StopId>, name: &str, geometry: Polygon) -> Arc<AreaStop> {
        let stop = Arc::new(AreaStop {
            id: id.into(),
            name: name.into(),
            geometry,
            index: self.repository.counter.next_index(),
        });
        self.repository.area_stops.insert(stop.id.clone(), stop.clone());
        stop
    }

    pub fn group_stop(&mut self, id: impl Into<StopId>, name: &str, child_stops: Vec<StopId>, center: Point) -> Arc<GroupStop> {
        let stop = Arc::new(GroupStop {
            id: id.into(),
            name: name.into(),
            child_stops,
            center,
            index: self.repository.counter.next_index(),
        });
        self.repository.group_stops.insert(stop.id.clone(), stop.clone());
        stop
    }

    /// Add a station. Child stops are collected from stops naming it as parent.
    pub fn station(&mut self, id: impl Into<StationId>, name: &str, center: Point) -> &mut Self {
        let station = Station {
            id: id.into(),
            name: name.into(),
            center,
            child_stops: Vec::new(),
        };
        self.repository.stations.insert(station.id.clone(), Arc::new(station));
        self
    }

    pub fn multi_modal_station(
        &mut self,
        id: impl Into<StationId>,
        name: &str,
        center: Point,
        child_stations: Vec<StationId>,
    ) -> &mut Self {
        let station = MultiModalStation {
            id: id.into(),
            name: name.into(),
            center,
            child_stations,
        };
        self.repository
            .multi_modal_stations
            .insert(station.id.clone(), Arc::new(station));
        self
    }

    pub fn group_of_stations(
        &mut self,
        id: impl Into<StationId>,
        name: &str,
        center: Point,
        child_stations: Vec<StationId>,
    ) -> &mut Self {
        let group = GroupOfStations {
            id: id.into(),
            name: name.into(),
            center,
            child_stations,
        };
        self.repository.groups_of_stations.insert(group.id.clone(), Arc::new(group));
        self
    }

    pub fn build(mut self) -> SiteRepository {
        let mut children: HashMap<StationId, Vec<StopId>> = HashMap::new();
        for stop in self.repository.regular_stops.values() {
            if let Some(parent) = &stop.parent_station {
                children.entry(parent.clone()).or_default().push(stop.id.clone());
            }
        }

        for (station_id, mut child_stops) in children {
            if let Some(station) = self.repository.stations.get_mut(&station_id) {
                child_stops.sort();
                Arc::make_mut(station).child_stops = child_stops;
            }
        }
        self.repository
    }
}

pub struct RegularStopBuilder<'a> {
    parent: &'a mut SiteRepositoryBuilder,
    stop: RegularStop,
}

impl RegularStopBuilder<'_> {
    pub fn parent_station(mut self, station: impl Into<StationId>) -> Self {
        self.stop.parent_station = Some(station.into());
        self
    }

    pub fn mode(mut self, mode: TransitMode) -> Self {
        self.stop.mode = Some(mode);
        self
    }

    pub fn add(self) -> Arc<RegularStop> {
        let stop = Arc::new(self.stop);
        self.parent.repository.regular_stops.insert(stop.id.clone(), stop.clone());
        stop
    }
}
