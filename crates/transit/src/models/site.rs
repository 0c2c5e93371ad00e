//! Stop locations and the groups that contain them.
//!
//! Stop kinds are a closed set, so they are modelled as sum types sharing the small
//! [`SiteEntity`] surface. Containment is stored as id lists, never as references.

use std::sync::Arc;

use geo::{Centroid, Point, Polygon};

use crate::identifiers::*;
use crate::models::traits::SiteEntity;
use crate::models::types::TransitMode;

// ============================================================================
// Stop locations
// ============================================================================

/// A boarding location with a point coordinate.
#[derive(Clone, Debug)]
pub struct RegularStop {
    pub id: StopId,
    pub name: Arc<str>,
    pub location: Point,
    /// Dense index assigned by the site repository's counter.
    pub index: usize,
    pub parent_station: Option<StationId>,
    /// Explicitly configured mode, overriding the modes of serving patterns.
    pub mode: Option<TransitMode>,
}

/// A flexible-service zone described by a polygon.
#[derive(Clone, Debug)]
pub struct AreaStop {
    pub id: StopId,
    pub name: Arc<str>,
    pub geometry: Polygon,
    pub index: usize,
}

/// A named set of stop locations served as one (e.g. a flex group).
#[derive(Clone, Debug)]
pub struct GroupStop {
    pub id: StopId,
    pub name: Arc<str>,
    pub child_stops: Vec<StopId>,
    pub center: Point,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub enum StopLocation {
    Regular(Arc<RegularStop>),
    Area(Arc<AreaStop>),
    Group(Arc<GroupStop>),
}

impl StopLocation {
    pub fn id(&self) -> &StopId {
        match self {
            Self::Regular(s) => &s.id,
            Self::Area(s) => &s.id,
            Self::Group(s) => &s.id,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::Regular(s) => s.index,
            Self::Area(s) => s.index,
            Self::Group(s) => s.index,
        }
    }

    /// Stops directly contained in this location. A regular or area stop contains
    /// only itself.
    pub fn child_stops(&self) -> Vec<StopId> {
        match self {
            Self::Group(g) => g.child_stops.clone(),
            other => vec![other.id().clone()],
        }
    }

    pub fn as_regular(&self) -> Option<&Arc<RegularStop>> {
        match self {
            Self::Regular(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_area(&self) -> Option<&Arc<AreaStop>> {
        match self {
            Self::Area(s) => Some(s),
            _ => None,
        }
    }
}

impl SiteEntity for StopLocation {
    fn id_str(&self) -> &str {
        self.id().as_str()
    }

    fn name(&self) -> &str {
        match self {
            Self::Regular(s) => &s.name,
            Self::Area(s) => &s.name,
            Self::Group(s) => &s.name,
        }
    }

    fn coordinate(&self) -> Point {
        match self {
            Self::Regular(s) => s.location,
            // An empty polygon has no centroid; fall back to the origin
            Self::Area(s) => s.geometry.centroid().unwrap_or_else(|| Point::new(0.0, 0.0)),
            Self::Group(s) => s.center,
        }
    }
}

// ============================================================================
// Stop groups
// ============================================================================

/// A station: a set of regular stops (platforms, quays) under one name.
#[derive(Clone, Debug)]
pub struct Station {
    pub id: StationId,
    pub name: Arc<str>,
    pub center: Point,
    pub child_stops: Vec<StopId>,
}

/// Several stations serving different modes at one place.
#[derive(Clone, Debug)]
pub struct MultiModalStation {
    pub id: StationId,
    pub name: Arc<str>,
    pub center: Point,
    pub child_stations: Vec<StationId>,
}

/// A loose grouping of stations or multimodal stations (e.g. a city's main stations).
#[derive(Clone, Debug)]
pub struct GroupOfStations {
    pub id: StationId,
    pub name: Arc<str>,
    pub center: Point,
    pub child_stations: Vec<StationId>,
}

#[derive(Clone, Debug)]
pub enum StopGroup {
    Station(Arc<Station>),
    MultiModal(Arc<MultiModalStation>),
    GroupOfStations(Arc<GroupOfStations>),
}

impl StopGroup {
    pub fn id(&self) -> &StationId {
        match self {
            Self::Station(s) => &s.id,
            Self::MultiModal(s) => &s.id,
            Self::GroupOfStations(s) => &s.id,
        }
    }

    /// Stations this group contains. A plain station contains none.
    pub fn child_stations(&self) -> &[StationId] {
        match self {
            Self::Station(_) => &[],
            Self::MultiModal(s) => &s.child_stations,
            Self::GroupOfStations(s) => &s.child_stations,
        }
    }
}

impl SiteEntity for StopGroup {
    fn id_str(&self) -> &str {
        self.id().as_str()
    }

    fn name(&self) -> &str {
        match self {
            Self::Station(s) => &s.name,
            Self::MultiModal(s) => &s.name,
            Self::GroupOfStations(s) => &s.name,
        }
    }

    fn coordinate(&self) -> Point {
        match self {
            Self::Station(s) => s.center,
            Self::MultiModal(s) => s.center,
            Self::GroupOfStations(s) => s.center,
        }
    }
}
