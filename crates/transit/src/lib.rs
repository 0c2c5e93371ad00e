//! # transit-core
//!
//! In-memory transit index with a realtime overlay.
//!
//! ## Features
//!
//! - **Service codes**: Dense integer codes and per-date running bitsets
//! - **Spatial queries**: R-tree indexes over regular and area stops
//! - **Schedule index**: Lookups by id, stop, route and group of routes
//! - **Realtime overlay**: Immutable snapshots of updated timetables, published atomically
//! - **Departure boards**: Next N departures or arrivals across service-day boundaries
//! - **Flex trips**: Area and group-stop trips (optional, `flex` feature)
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use transit_core::prelude::*;
//! use geo::Point;
//!
//! let mut builder = SiteRepository::builder();
//! builder
//!     .regular_stop("oslo:jernbanetorget", "Jernbanetorget", Point::new(10.7506, 59.9115))
//!     .add();
//! builder
//!     .regular_stop("oslo:stortinget", "Stortinget", Point::new(10.7412, 59.9134))
//!     .add();
//!
//! let repository = Arc::new(TimetableRepository::new(builder.build(), IndexConfig::default()));
//! let service = TransitService::new(repository).unwrap();
//!
//! // Stops within 300m of Oslo Central Station
//! let nearby = service
//!     .schedule_index()
//!     .spatial()
//!     .find_regular_stops_near(Point::new(10.7522, 59.9110), 300.0);
//! assert_eq!(nearby.len(), 1);
//! ```

pub mod config;
pub mod identifiers;
pub mod index;
pub mod models;
pub mod realtime;
pub mod repository;
pub mod service;
pub mod service_code;
pub mod spatial;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub mod prelude {
    pub use crate::config::IndexConfig;
    pub use crate::identifiers::*;
    pub use crate::index::ScheduleIndex;
    pub use crate::models::{traits::*, types::*};
    pub use crate::realtime::{OverlayBuffer, OverlayPublisher, RealTimeTripUpdate, RealtimeOverlay};
    pub use crate::repository::{SiteRepository, TimetableRepository};
    pub use crate::service::{departure_board, DepartureBoardRequest, TransitService, TripTimeOnDate};
    pub use crate::service_code::{ServiceCode, ServiceCodeRegistry};
}

pub use prelude::*;
