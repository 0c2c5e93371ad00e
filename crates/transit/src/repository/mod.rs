//! Mutable repositories filled by feed loaders before the index is built.

pub mod site_repository;
pub mod timetable_repository;

pub use site_repository::{RegularStopBuilder, SiteRepository, SiteRepositoryBuilder, StopIndexCounter};
pub use timetable_repository::TimetableRepository;
