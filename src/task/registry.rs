//! Registry of in-flight upload tasks
//!
//! Every active task id maps to exactly one entry holding the task state,
//! the adapter's cancel handle, the caller's completion slot and the
//! event-bus subscription. Entries are evicted once, either by the terminal
//! adapter callback or by cancellation; whichever evicts first owns the
//! terminal transition.

use crate::adapter::TransferHandle;
use crate::callback::Completion;
use crate::error::{Result, UploadError};
use crate::events::SubscriptionToken;
use crate::task::types::{TaskId, TaskState, UploadTask};
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A registered task and everything tied to its lifetime
pub struct TaskEntry {
    pub task: UploadTask,
    pub handle: Option<Arc<dyn TransferHandle>>,
    pub(crate) completion: Arc<Completion>,
    pub subscription: Option<SubscriptionToken>,
}

impl std::fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEntry")
            .field("task", &self.task)
            .field("handle", &self.handle.is_some())
            .field("subscription", &self.subscription)
            .finish()
    }
}

/// Thread-safe map from task id to task entry
#[derive(Clone, Default)]
pub struct TaskRegistry {
    entries: Arc<Mutex<HashMap<TaskId, TaskEntry>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new task; fails if its id is already present
    pub(crate) fn register(&self, task: UploadTask, completion: Arc<Completion>) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.contains_key(&task.id) {
            return Err(UploadError::duplicate_task_id(task.id.as_str()));
        }

        debug!("Registered upload task {}", task.id);
        entries.insert(
            task.id.clone(),
            TaskEntry {
                task,
                handle: None,
                completion,
                subscription: None,
            },
        );
        Ok(())
    }

    /// Snapshot of a registered task, or `None` if it is not (or no longer) registered
    pub fn lookup(&self, id: &str) -> Option<UploadTask> {
        self.entries.lock().get(id).map(|entry| entry.task.clone())
    }

    /// The adapter handle stored for `id`, if the task is registered and started
    pub fn handle(&self, id: &str) -> Option<Arc<dyn TransferHandle>> {
        self.entries
            .lock()
            .get(id)
            .and_then(|entry| entry.handle.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    /// Store the adapter handle, replacing the placeholder set at registration.
    ///
    /// Hands the handle back if the task was evicted in the meantime.
    pub(crate) fn attach_handle(
        &self,
        id: &str,
        handle: Arc<dyn TransferHandle>,
    ) -> std::result::Result<(), Arc<dyn TransferHandle>> {
        match self.entries.lock().get_mut(id) {
            Some(entry) => {
                entry.handle = Some(handle);
                Ok(())
            }
            None => Err(handle),
        }
    }

    pub(crate) fn set_subscription(&self, id: &str, token: SubscriptionToken) -> bool {
        match self.entries.lock().get_mut(id) {
            Some(entry) => {
                entry.subscription = Some(token);
                true
            }
            None => false,
        }
    }

    pub(crate) fn transition(&self, id: &str, next: TaskState) -> bool {
        self.entries
            .lock()
            .get_mut(id)
            .map(|entry| entry.task.transition(next))
            .unwrap_or(false)
    }

    /// Update progress counters.
    ///
    /// Returns the task's completion slot when recorded, `None` when the task
    /// is not registered or already terminal.
    pub(crate) fn record_progress(
        &self,
        id: &str,
        current: u64,
        total: u64,
    ) -> Option<Arc<Completion>> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(id)?;
        if !entry.task.record_progress(current, total) {
            return None;
        }
        trace!("Task {} progress {}/{}", id, current, total);
        Some(entry.completion.clone())
    }

    /// Evict a task, handing back its entry to whoever evicted it
    pub(crate) fn remove(&self, id: &str) -> Option<TaskEntry> {
        let removed = self.entries.lock().remove(id);
        if removed.is_some() {
            debug!("Removed upload task {}", id);
        }
        removed
    }

    /// Request cancellation of every registered task and clear the registry.
    ///
    /// Handles are cancelled after the lock is released; the evicted entries
    /// are returned so their callers can be settled.
    pub(crate) fn cancel_all(&self) -> Vec<TaskEntry> {
        let drained: Vec<TaskEntry> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, entry)| entry).collect()
        };

        for entry in &drained {
            if let Some(handle) = &entry.handle {
                handle.cancel();
            }
        }

        if !drained.is_empty() {
            debug!("Cancelled {} registered upload task(s)", drained.len());
        }
        drained
    }

    pub fn ids(&self) -> Vec<TaskId> {
        self.entries.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandle {
        cancels: AtomicUsize,
    }

    impl TransferHandle for CountingHandle {
        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn task(id: &str) -> UploadTask {
        UploadTask::new(TaskId::from(id), "bucket", "key", "/tmp/f.bin")
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = TaskRegistry::new();
        registry
            .register(task("t1"), Arc::new(Completion::new()))
            .unwrap();

        let snapshot = registry.lookup("t1").unwrap();
        assert_eq!(snapshot.state, TaskState::Pending);
        assert!(registry.lookup("t2").is_none());
        assert!(registry.handle("t1").is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let registry = TaskRegistry::new();
        registry
            .register(task("t1"), Arc::new(Completion::new()))
            .unwrap();

        let err = registry
            .register(task("t1"), Arc::new(Completion::new()))
            .unwrap_err();
        assert!(matches!(err, UploadError::DuplicateTaskId { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_attach_handle_after_removal() {
        let registry = TaskRegistry::new();
        registry
            .register(task("t1"), Arc::new(Completion::new()))
            .unwrap();
        assert!(registry.remove("t1").is_some());

        let handle: Arc<dyn TransferHandle> = Arc::new(CountingHandle::default());
        assert!(registry.attach_handle("t1", handle).is_err());
        assert!(registry.remove("t1").is_none());
    }

    #[test]
    fn test_record_progress_requires_registration() {
        let registry = TaskRegistry::new();
        assert!(registry.record_progress("t1", 1, 2).is_none());

        registry
            .register(task("t1"), Arc::new(Completion::new()))
            .unwrap();
        assert!(registry.record_progress("t1", 1, 2).is_some());
        assert_eq!(registry.lookup("t1").unwrap().state, TaskState::InProgress);
    }

    #[test]
    fn test_cancel_all() {
        let registry = TaskRegistry::new();
        let handle = Arc::new(CountingHandle::default());

        for id in ["t1", "t2", "t3"] {
            registry
                .register(task(id), Arc::new(Completion::new()))
                .unwrap();
        }
        registry.attach_handle("t1", handle.clone()).ok().unwrap();
        registry.attach_handle("t2", handle.clone()).ok().unwrap();

        let drained = registry.cancel_all();
        assert_eq!(drained.len(), 3);
        assert_eq!(handle.cancels.load(Ordering::SeqCst), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_register_remove() {
        let registry = TaskRegistry::new();
        let threads: Vec<_> = (0..8)
            .map(|n| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("t{}-{}", n, i);
                        registry
                            .register(task(&id), Arc::new(Completion::new()))
                            .unwrap();
                        assert!(registry.remove(&id).is_some());
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
