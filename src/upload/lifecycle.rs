//! Host application lifecycle signals
//!
//! When the host leaves the foreground it can no longer observe transfers,
//! so every in-flight upload is cancelled rather than left orphaned.

use crate::upload::coordinator::UploadCoordinator;
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostLifecycleEvent {
    WillResignActive,
    Background,
    Foreground,
}

impl HostLifecycleEvent {
    pub fn cancels_uploads(self) -> bool {
        matches!(
            self,
            HostLifecycleEvent::WillResignActive | HostLifecycleEvent::Background
        )
    }
}

impl UploadCoordinator {
    /// React to a host lifecycle change; returns how many uploads were cancelled
    pub fn handle_host_event(&self, event: HostLifecycleEvent) -> usize {
        debug!("Host lifecycle event: {:?}", event);
        if event.cancels_uploads() {
            self.cancel_all()
        } else {
            0
        }
    }
}
