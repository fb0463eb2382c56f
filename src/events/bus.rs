//! The shared progress channel
//!
//! One bus carries events for every running task. Subscribers register for a
//! single task id and only see that task's events; the filter is applied at
//! delivery time, on the dispatcher's context. A task subscription is removed
//! when its terminal event is delivered.

use crate::events::dispatch::{DispatchJob, EventDispatcher};
use crate::events::types::ProgressEvent;
use crate::task::TaskId;
use log::{trace, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback invoked for each delivered event
pub type EventHandler = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Identifies one subscription for later removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

enum Filter {
    Task(TaskId),
    All,
}

struct Subscription {
    filter: Filter,
    handler: EventHandler,
}

#[derive(Default)]
struct BusInner {
    subscriptions: Mutex<BTreeMap<SubscriptionToken, Subscription>>,
    next_token: AtomicU64,
}

impl BusInner {
    fn insert(&self, filter: Filter, handler: EventHandler) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .lock()
            .insert(token, Subscription { filter, handler });
        token
    }

    fn deliver(&self, event: &ProgressEvent) {
        // Handlers run outside the lock so they may subscribe or unsubscribe.
        let handlers: Vec<EventHandler> = {
            let mut subscriptions = self.subscriptions.lock();
            let matching: Vec<SubscriptionToken> = subscriptions
                .iter()
                .filter(|(_, sub)| match &sub.filter {
                    Filter::Task(id) => *id == event.task_id,
                    Filter::All => true,
                })
                .map(|(token, _)| *token)
                .collect();

            let mut handlers = Vec::with_capacity(matching.len());
            for token in matching {
                let finished = event.is_terminal()
                    && matches!(
                        subscriptions.get(&token).map(|sub| &sub.filter),
                        Some(Filter::Task(_))
                    );
                let handler = if finished {
                    subscriptions.remove(&token).map(|sub| sub.handler)
                } else {
                    subscriptions.get(&token).map(|sub| sub.handler.clone())
                };
                handlers.extend(handler);
            }
            handlers
        };

        trace!(
            "Delivering {} event for {} to {} handler(s)",
            event.kind.type_name(),
            event.task_id,
            handlers.len()
        );
        // A panicking handler must not take down the delivery context or
        // skip the work queued behind it.
        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(
                    "Subscriber panicked handling {} event for {}",
                    event.kind.type_name(),
                    event.task_id
                );
            }
        }
    }
}

/// Broadcast channel for progress and terminal events of all tasks
#[derive(Clone)]
pub struct ProgressEventBus {
    inner: Arc<BusInner>,
    dispatcher: Arc<dyn EventDispatcher>,
}

impl ProgressEventBus {
    pub fn new(dispatcher: Arc<dyn EventDispatcher>) -> Self {
        Self {
            inner: Arc::new(BusInner::default()),
            dispatcher,
        }
    }

    /// Receive the events of one task until its terminal event
    pub fn subscribe<F>(&self, task_id: TaskId, handler: F) -> SubscriptionToken
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.inner.insert(Filter::Task(task_id), Arc::new(handler))
    }

    /// Receive every event on the channel, for bridging to a host runtime
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionToken
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.inner.insert(Filter::All, Arc::new(handler))
    }

    /// Remove a subscription; returns false if it was already gone
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.inner.subscriptions.lock().remove(&token).is_some()
    }

    /// Deliver `event` to its matching subscribers on the delivery context
    pub fn publish(&self, event: ProgressEvent) {
        let inner = self.inner.clone();
        self.dispatcher
            .dispatch(Box::new(move || inner.deliver(&event)));
    }

    /// Like [`publish`](Self::publish), but `guard` is evaluated on the
    /// delivery context and the event is dropped if it returns false
    pub fn publish_if<G>(&self, event: ProgressEvent, guard: G)
    where
        G: FnOnce(&ProgressEvent) -> bool + Send + 'static,
    {
        let inner = self.inner.clone();
        self.dispatcher.dispatch(Box::new(move || {
            if guard(&event) {
                inner.deliver(&event);
            } else {
                trace!("Dropping {} event for {}", event.kind.type_name(), event.task_id);
            }
        }));
    }

    /// Deliver `event`, then run `then` within the same delivery job
    pub fn publish_then(&self, event: ProgressEvent, then: DispatchJob) {
        let inner = self.inner.clone();
        self.dispatcher.dispatch(Box::new(move || {
            inner.deliver(&event);
            then();
        }));
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriptions.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::dispatch::InlineDispatcher;
    use crate::events::types::ProgressEventKind;

    fn inline_bus() -> ProgressEventBus {
        ProgressEventBus::new(Arc::new(InlineDispatcher))
    }

    #[test]
    fn test_per_task_filtering() {
        let bus = inline_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        bus.subscribe(TaskId::from("t1"), move |event| {
            seen_clone.lock().push(event.task_id.clone())
        });

        bus.publish(ProgressEvent::progress(TaskId::from("t1"), 1, 10));
        bus.publish(ProgressEvent::progress(TaskId::from("t2"), 1, 10));
        bus.publish(ProgressEvent::progress(TaskId::from("t1"), 5, 10));

        assert_eq!(*seen.lock(), vec![TaskId::from("t1"), TaskId::from("t1")]);
    }

    #[test]
    fn test_terminal_event_ends_subscription() {
        let bus = inline_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        let token = bus.subscribe(TaskId::from("t1"), move |event| {
            seen_clone.lock().push(event.kind.clone())
        });

        bus.publish(ProgressEvent::completed(TaskId::from("t1")));
        bus.publish(ProgressEvent::progress(TaskId::from("t1"), 1, 1));

        assert_eq!(*seen.lock(), vec![ProgressEventKind::Completed]);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(!bus.unsubscribe(token));
    }

    #[test]
    fn test_double_unsubscribe() {
        let bus = inline_bus();
        let token = bus.subscribe(TaskId::from("t1"), |_| {});

        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
    }

    #[test]
    fn test_subscribe_all_sees_every_task() {
        let bus = inline_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = seen.clone();
        bus.subscribe_all(move |event| seen_clone.lock().push(event.task_id.clone()));

        bus.publish(ProgressEvent::progress(TaskId::from("t1"), 1, 2));
        bus.publish(ProgressEvent::cancelled(TaskId::from("t2")));

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_if_guard() {
        let bus = inline_bus();
        let seen = Arc::new(Mutex::new(0));

        let seen_clone = seen.clone();
        bus.subscribe(TaskId::from("t1"), move |_| *seen_clone.lock() += 1);

        bus.publish_if(ProgressEvent::progress(TaskId::from("t1"), 1, 2), |_| false);
        bus.publish_if(ProgressEvent::progress(TaskId::from("t1"), 2, 2), |_| true);

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_publish_then_runs_after_delivery() {
        let bus = inline_bus();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_clone = order.clone();
        bus.subscribe(TaskId::from("t1"), move |event| {
            order_clone.lock().push(event.kind.type_name())
        });

        let order_clone = order.clone();
        bus.publish_then(
            ProgressEvent::failed(TaskId::from("t1"), "boom"),
            Box::new(move || order_clone.lock().push("settled")),
        );

        assert_eq!(*order.lock(), vec!["failed", "settled"]);
    }

    #[test]
    fn test_panicking_handler_does_not_skip_settlement() {
        let bus = inline_bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(TaskId::from("t1"), |_| panic!("hook failed"));
        let seen_clone = seen.clone();
        bus.subscribe_all(move |event| seen_clone.lock().push(event.kind.type_name()));

        let seen_clone = seen.clone();
        bus.publish_then(
            ProgressEvent::cancelled(TaskId::from("t1")),
            Box::new(move || seen_clone.lock().push("settled")),
        );
        bus.publish(ProgressEvent::progress(TaskId::from("t2"), 1, 2));

        assert_eq!(*seen.lock(), vec!["cancelled", "settled", "progress"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        let bus = inline_bus();
        let token_slot = Arc::new(Mutex::new(None));

        let bus_clone = bus.clone();
        let slot_clone = token_slot.clone();
        let token = bus.subscribe(TaskId::from("t1"), move |_| {
            if let Some(token) = slot_clone.lock().take() {
                bus_clone.unsubscribe(token);
            }
        });
        *token_slot.lock() = Some(token);

        bus.publish(ProgressEvent::progress(TaskId::from("t1"), 1, 2));
        assert_eq!(bus.subscriber_count(), 0);
    }
}
