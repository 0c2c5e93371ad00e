//! Transit data models, types, and traits.

pub mod calendar;
pub mod network;
pub mod pattern;
pub mod site;
pub mod time;
pub mod timetable;
pub mod traits;
pub mod types;

// Re-exports for convenience
pub use calendar::{CalendarServiceData, ServiceCalendar, WeekdayFlags};
pub use network::{Agency, FlexTrip, GroupOfRoutes, Notice, PathTransfer, Route, Trip, TripOnServiceDate};
pub use pattern::{StopPattern, TripPattern};
pub use site::{AreaStop, GroupOfStations, GroupStop, MultiModalStation, RegularStop, Station, StopGroup, StopLocation};
pub use timetable::{Timetable, TimetableBuilder, TripTimes, TripTimesUpdate};
pub use traits::{SiteEntity, TransitProvider};
pub use types::{
    ArrivalDeparture, DataQualityIssue, DirectionId, PickDrop, RealTimeState, Result, TransitError, TransitMode,
};
