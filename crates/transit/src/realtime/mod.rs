//! Realtime overlays: staging, freezing and publication.

pub mod buffer;
pub mod overlay;
pub mod publisher;

pub use buffer::{OverlayBuffer, RealTimeTripUpdate};
pub use overlay::RealtimeOverlay;
pub use publisher::OverlayPublisher;
