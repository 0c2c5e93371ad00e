//! Spatial query utilities for distance calculations.
//!
//! Uses Haversine formula for accurate distances on Earth's surface.

use geo::{HaversineDistance, Point, Rect};

/// Mean Earth radius used by the Haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

// Envelope widening so the exact distance filter sees every candidate
const ENVELOPE_MARGIN: f64 = 1.01;

/// Calculate Haversine distance between two points in meters
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    p1.haversine_distance(&p2)
}

/// Convert meters along a meridian to degrees of latitude
pub fn meters_to_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_M).to_degrees()
}

/// Box around a point that contains every point within `radius_m`.
///
/// Longitude degrees shrink towards the poles, so the box is widened by the cosine
/// of the latitude. Near the poles the box spans all longitudes.
pub fn bounding_box_around(center: Point, radius_m: f64) -> Rect {
    let dlat = meters_to_degrees(radius_m) * ENVELOPE_MARGIN;
    let cos_lat = center.y().to_radians().cos();
    let dlon = if cos_lat < 1e-6 { 180.0 } else { (dlat / cos_lat).min(180.0) };

    Rect::new(
        geo::coord! { x: center.x() - dlon, y: center.y() - dlat },
        geo::coord! { x: center.x() + dlon, y: center.y() + dlat },
    )
}
