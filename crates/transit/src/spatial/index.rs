//! R-tree nodes for spatial indexing.
//!
//! Wraps stop locations with geometric data for efficient spatial queries.
//!
//! ## Two-Stage Filtering
//!
//! The spatial queries use a two-stage filtering approach:
//! 1. **R-tree filter**: envelope queries in degrees for fast approximate filtering
//! 2. **Exact filter**: containment or Haversine distance on the filtered results
//!
//! Area stops only get the first stage. Their envelope is the polygon's bounding
//! rectangle, so a zone overlapping a query box near a corner can be reported even
//! when the polygon itself does not reach into the box.

use std::sync::Arc;

use geo::{BoundingRect, Rect};
use rstar::{PointDistance, RTreeObject, AABB};

use crate::models::site::{AreaStop, RegularStop};

pub(crate) fn aabb_of(rect: &Rect) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

// ============================================================================
// Regular Stop Spatial Node
// ============================================================================

#[derive(Clone, Debug)]
pub struct StopNode {
    pub stop: Arc<RegularStop>,
    point: [f64; 2],
}

impl StopNode {
    pub fn new(stop: Arc<RegularStop>) -> Self {
        Self {
            point: [stop.location.x(), stop.location.y()],
            stop,
        }
    }
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ============================================================================
// Area Stop Spatial Node
// ============================================================================

#[derive(Clone, Debug)]
pub struct AreaStopNode {
    pub stop: Arc<AreaStop>,
    aabb: AABB<[f64; 2]>,
}

impl AreaStopNode {
    /// `None` for an area stop with an empty polygon.
    pub fn new(stop: Arc<AreaStop>) -> Option<Self> {
        let rect = stop.geometry.bounding_rect()?;
        Some(Self {
            aabb: aabb_of(&rect),
            stop,
        })
    }
}

impl RTreeObject for AreaStopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}
