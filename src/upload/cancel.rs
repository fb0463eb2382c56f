//! Cancellation of in-flight uploads
//!
//! Cancelling evicts the registry entry first, so a task can only be
//! cancelled once, then asks the adapter to abort without waiting for it.
//! The `cancelled` event and the caller's `UploadCancelled` rejection are
//! produced here rather than awaited from the adapter; if the adapter later
//! reports its own outcome for the task, that report is dropped.

use crate::adapter::TransferOutcome;
use crate::upload::coordinator::UploadCoordinator;
use log::{debug, info};

impl UploadCoordinator {
    /// Cancel one upload. Unknown or already finished ids are ignored.
    pub fn cancel_upload(&self, task_id: impl AsRef<str>) {
        let task_id = task_id.as_ref();

        let Some(entry) = self.shared.registry.remove(task_id) else {
            debug!("Cancel ignored, no active task {}", task_id);
            return;
        };

        info!("Cancelling upload {}", task_id);
        if let Some(handle) = &entry.handle {
            handle.cancel();
        }
        self.shared.conclude(entry, TransferOutcome::Cancelled);
    }

    /// Cancel every in-flight upload; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let entries = self.shared.registry.cancel_all();
        let count = entries.len();

        for entry in entries {
            self.shared.conclude(entry, TransferOutcome::Cancelled);
        }

        if count > 0 {
            info!("Cancelled {} in-flight upload(s)", count);
        }
        count
    }

    /// Tear down the coordinator's in-flight work
    pub fn shutdown(&self) -> usize {
        self.cancel_all()
    }
}
