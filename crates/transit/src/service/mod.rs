//! Request-scoped query facade and departure boards.

pub mod bounded_queue;
pub mod departures;
pub mod transit_service;

pub use bounded_queue::BoundedQueue;
pub use departures::{
    departure_board, stop_times_for_pattern_at_stop, stop_times_for_stop, stop_times_for_stop_on_date,
    DepartureBoardRequest, StopTimesInPattern, StopTimesOnDateRequest, TripTimeOnDate,
};
pub use transit_service::{Deadline, DeadlineCheck, NoDeadline, TransitService};
