//! Spatial indexing and query utilities.

pub mod index;
pub mod queries;
pub mod stop_index;

pub use queries::{bounding_box_around, haversine_distance};
pub use stop_index::SpatialStopIndex;
