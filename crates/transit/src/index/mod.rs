//! Immutable indexes built from a [`TimetableRepository`](crate::repository::TimetableRepository).

#[cfg(feature = "flex")]
pub mod flex;
pub mod schedule_index;

#[cfg(feature = "flex")]
pub use flex::FlexIndex;
pub use schedule_index::ScheduleIndex;
