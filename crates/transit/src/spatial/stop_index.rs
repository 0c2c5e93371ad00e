//! Spatial and positional index over the stops of a site repository.

use std::collections::HashMap;
use std::sync::Arc;

use geo::{Intersects, Point, Rect};
use rstar::RTree;
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::identifiers::StationId;
use crate::models::site::{AreaStop, MultiModalStation, RegularStop, StopLocation};
use crate::models::types::DataQualityIssue;
use crate::repository::SiteRepository;
use crate::spatial::index::{aabb_of, AreaStopNode, StopNode};
use crate::spatial::queries::{bounding_box_around, haversine_distance};

/// Read-only after construction. Rebuilt whenever the site repository changes.
#[derive(Debug)]
pub struct SpatialStopIndex {
    regular_stops: RTree<StopNode>,
    area_stops: RTree<AreaStopNode>,
    stops_by_index: Vec<Option<StopLocation>>,
    multi_modal_by_station: HashMap<StationId, Arc<MultiModalStation>>,
    hole_count: usize,
    issue: Option<DataQualityIssue>,
}

impl SpatialStopIndex {
    pub fn build(site: &SiteRepository, config: &IndexConfig) -> Self {
        let regular_nodes: Vec<StopNode> = site.regular_stops().cloned().map(StopNode::new).collect();
        let area_nodes: Vec<AreaStopNode> = site.area_stops().cloned().filter_map(AreaStopNode::new).collect();

        // Slots are never reused, so the array is sized to the counter, not the stop count
        let size = site.stop_index_size();
        let mut stops_by_index: Vec<Option<StopLocation>> = vec![None; size];
        for stop in site.stop_locations() {
            let index = stop.index();
            if index >= stops_by_index.len() {
                stops_by_index.resize(index + 1, None);
            }
            stops_by_index[index] = Some(stop);
        }
        let hole_count = stops_by_index.iter().filter(|s| s.is_none()).count();

        let mut issue = None;
        if !stops_by_index.is_empty() {
            let ratio = hole_count as f64 / stops_by_index.len() as f64;
            if ratio > config.max_stop_index_hole_ratio {
                let sparse = DataQualityIssue::SparseStopIndex {
                    holes: hole_count,
                    size: stops_by_index.len(),
                };
                warn!(holes = hole_count, size = stops_by_index.len(), "{sparse}");
                issue = Some(sparse);
            }
        }

        let mut multi_modal_by_station = HashMap::new();
        for mm in site.multi_modal_stations() {
            for child in &mm.child_stations {
                multi_modal_by_station.insert(child.clone(), mm.clone());
            }
        }

        debug!(
            regular_stops = regular_nodes.len(),
            area_stops = area_nodes.len(),
            holes = hole_count,
            "Built spatial stop index"
        );

        Self {
            regular_stops: RTree::bulk_load(regular_nodes),
            area_stops: RTree::bulk_load(area_nodes),
            stops_by_index,
            multi_modal_by_station,
            hole_count,
            issue,
        }
    }

    /// Regular stops whose coordinate lies inside the box, boundary included.
    pub fn find_regular_stops(&self, bbox: &Rect) -> Vec<Arc<RegularStop>> {
        self.regular_stops
            .locate_in_envelope_intersecting(&aabb_of(bbox))
            .filter(|node| bbox.intersects(&node.stop.location.0))
            .map(|node| node.stop.clone())
            .collect()
    }

    /// Area stops whose bounding rectangle intersects the box. The polygons
    /// themselves are not tested.
    pub fn find_area_stops(&self, bbox: &Rect) -> Vec<Arc<AreaStop>> {
        self.area_stops
            .locate_in_envelope_intersecting(&aabb_of(bbox))
            .map(|node| node.stop.clone())
            .collect()
    }

    /// Regular stops within `radius_m` meters, closest first, with their distance.
    pub fn find_regular_stops_near(&self, point: Point, radius_m: f64) -> Vec<(Arc<RegularStop>, f64)> {
        let envelope = aabb_of(&bounding_box_around(point, radius_m));

        let mut found: Vec<(Arc<RegularStop>, f64)> = self
            .regular_stops
            .locate_in_envelope(&envelope)
            .map(|node| (node.stop.clone(), haversine_distance(point, node.stop.location)))
            .filter(|(_, distance)| *distance <= radius_m)
            .collect();

        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        found
    }

    /// The `n` closest regular stops by planar distance in degrees.
    pub fn nearest_regular_stops(&self, point: Point, n: usize) -> Vec<Arc<RegularStop>> {
        self.regular_stops
            .nearest_neighbor_iter(&[point.x(), point.y()])
            .take(n)
            .map(|node| node.stop.clone())
            .collect()
    }

    /// Multimodal station the station belongs to, if any.
    pub fn multi_modal_station_for(&self, station: &StationId) -> Option<Arc<MultiModalStation>> {
        self.multi_modal_by_station.get(station).cloned()
    }

    pub fn stop_by_index(&self, index: usize) -> Option<&StopLocation> {
        self.stops_by_index.get(index).and_then(|s| s.as_ref())
    }

    /// Length of the dense stop array, holes included.
    pub fn stop_index_size(&self) -> usize {
        self.stops_by_index.len()
    }

    pub fn hole_count(&self) -> usize {
        self.hole_count
    }

    /// Sparse-array warning raised during construction, if any.
    pub fn data_quality_issue(&self) -> Option<&DataQualityIssue> {
        self.issue.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::StopId;
    use crate::repository::{SiteRepositoryBuilder, StopIndexCounter};
    use geo::{coord, polygon};

    fn site() -> SiteRepository {
        let mut builder = SiteRepository::builder();
        builder.regular_stop("central", "Central", Point::new(10.75, 59.91)).add();
        builder.regular_stop("harbour", "Harbour", Point::new(10.73, 59.90)).add();
        builder.regular_stop("airport", "Airport", Point::new(11.10, 60.19)).add();
        builder.area_stop(
            "zone",
            "Flex zone",
            polygon![(x: 10.70, y: 59.85), (x: 10.80, y: 59.85), (x: 10.80, y: 59.88)],
        );
        builder.build()
    }

    fn ids(stops: &[Arc<RegularStop>]) -> Vec<String> {
        let mut ids: Vec<String> = stops.iter().map(|s| s.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn test_find_regular_stops_in_box() {
        let index = SpatialStopIndex::build(&site(), &IndexConfig::default());

        let city = Rect::new(coord! { x: 10.70, y: 59.89 }, coord! { x: 10.80, y: 59.95 });
        assert_eq!(ids(&index.find_regular_stops(&city)), vec!["central", "harbour"]);

        // Boundary counts as inside
        let edge = Rect::new(coord! { x: 10.75, y: 59.91 }, coord! { x: 10.76, y: 59.92 });
        assert_eq!(ids(&index.find_regular_stops(&edge)), vec!["central"]);
    }

    #[test]
    fn test_area_stops_envelope_only() {
        let index = SpatialStopIndex::build(&site(), &IndexConfig::default());

        // The triangle does not reach the top-left corner of its bounding rect
        let corner = Rect::new(coord! { x: 10.70, y: 59.875 }, coord! { x: 10.71, y: 59.88 });
        let found = index.find_area_stops(&corner);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, StopId::new("zone"));

        let far = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(index.find_area_stops(&far).is_empty());
    }

    #[test]
    fn test_stops_near_sorted_by_distance() {
        let index = SpatialStopIndex::build(&site(), &IndexConfig::default());
        let near = index.find_regular_stops_near(Point::new(10.751, 59.911), 2_000.0);

        assert_eq!(near.len(), 2);
        assert_eq!(near[0].0.id, StopId::new("central"));
        assert!(near[0].1 < near[1].1);

        let nearest = index.nearest_regular_stops(Point::new(11.0, 60.1), 1);
        assert_eq!(nearest[0].id, StopId::new("airport"));
    }

    #[test]
    fn test_dense_index_with_holes() {
        let counter = StopIndexCounter::new();
        let mut builder = SiteRepositoryBuilder::new(counter.clone());
        builder.regular_stop("a", "A", Point::new(0.0, 0.0)).add();
        // Reserve slots that are never filled
        for _ in 0..3 {
            counter.next_index();
        }
        builder.regular_stop("b", "B", Point::new(0.0, 0.0)).add();

        let index = SpatialStopIndex::build(&builder.build(), &IndexConfig::default());
        assert_eq!(index.stop_index_size(), 5);
        assert_eq!(index.hole_count(), 3);
        assert_eq!(index.stop_by_index(4).map(|s| s.id().as_str()), Some("b"));
        assert!(index.stop_by_index(2).is_none());
        assert!(matches!(
            index.data_quality_issue(),
            Some(DataQualityIssue::SparseStopIndex { holes: 3, size: 5 })
        ));

        let dense = SpatialStopIndex::build(&site(), &IndexConfig::default());
        assert_eq!(dense.hole_count(), 0);
        assert!(dense.data_quality_issue().is_none());
    }

    #[test]
    fn test_multi_modal_parent_lookup() {
        let mut builder = SiteRepository::builder();
        builder.station("rail", "Central Rail", Point::new(10.75, 59.91));
        builder.station("bus", "Central Bus", Point::new(10.75, 59.91));
        builder.station("lonely", "Elsewhere", Point::new(10.0, 59.0));
        builder.multi_modal_station("hub", "Central", Point::new(10.75, 59.91), vec!["rail".into(), "bus".into()]);
        let index = SpatialStopIndex::build(&builder.build(), &IndexConfig::default());

        assert_eq!(
            index.multi_modal_station_for(&StationId::new("bus")).map(|m| m.id.clone()),
            Some(StationId::new("hub"))
        );
        assert!(index.multi_modal_station_for(&StationId::new("lonely")).is_none());
    }
}
