//! Atomic "current overlay" slot shared by the updater and request threads.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use tracing::info;

use crate::models::types::{Result, TransitError};
use crate::realtime::overlay::RealtimeOverlay;

/// Readers never block and never see a partially built overlay.
#[derive(Debug, Default)]
pub struct OverlayPublisher {
    current: ArcSwapOption<RealtimeOverlay>,
    source: Mutex<Option<String>>,
}

impl OverlayPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the realtime source feeding this publisher. Only one source may be
    /// attached.
    pub fn attach_source(&self, name: &str) -> Result<()> {
        let mut source = self.source.lock();
        if let Some(existing) = source.as_ref() {
            return Err(TransitError::RealtimeSourceAlreadyAttached {
                existing: existing.clone(),
                attempted: name.to_string(),
            });
        }
        info!(source = name, "Realtime source attached");
        *source = Some(name.to_string());
        Ok(())
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    pub fn publish(&self, overlay: Arc<RealtimeOverlay>) {
        self.current.store(Some(overlay));
    }

    /// Latest published overlay, `None` before the first publish.
    pub fn current(&self) -> Option<Arc<RealtimeOverlay>> {
        self.current.load_full()
    }
}
