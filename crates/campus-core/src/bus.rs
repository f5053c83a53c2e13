//! Synchronous publish/subscribe bus routed on event tags.

use crate::disposer::Disposer;
use crate::error::HandlerError;
use campus_config::FailurePolicy;
use campus_protocol::{DomainEvent, EventTag};
use log::{debug, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Event type that can travel on an [`EventBus`].
pub trait BusEvent: Send + Sync + 'static {
    /// Routing discriminant.
    type Tag: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static;

    fn tag(&self) -> Self::Tag;
}

impl BusEvent for DomainEvent {
    type Tag = EventTag;

    fn tag(&self) -> EventTag {
        DomainEvent::tag(self)
    }
}

/// Handler invoked for events of the tag it subscribed to.
pub trait EventHandler<E>: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;
    fn handle(&self, event: &E) -> Result<(), HandlerError>;
}

/// One handler failure observed during an emit.
#[derive(Debug)]
pub struct HandlerFailure {
    pub handler: String,
    pub error: HandlerError,
}

/// Outcome of a single `emit`.
#[derive(Debug, Default)]
pub struct EmitReport {
    /// Handlers that completed successfully.
    pub delivered: usize,
    pub failures: Vec<HandlerFailure>,
    /// Delivery stopped early under [`FailurePolicy::Halt`].
    pub halted: bool,
}

impl EmitReport {
    /// True when every handler succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Subscription<E> {
    id: u64,
    handler: Arc<dyn EventHandler<E>>,
}

type HandlerTable<E> = RwLock<HashMap<<E as BusEvent>::Tag, Vec<Subscription<E>>>>;

/// Typed event bus with per-tag handler lists.
///
/// `emit` runs every handler subscribed to the event's tag, in subscription
/// order, before returning. The handler list is copied at the start of each
/// emit, so subscriptions added or disposed by a handler take effect on the
/// next emit only.
pub struct EventBus<E: BusEvent> {
    handlers: Arc<HandlerTable<E>>,
    next_id: AtomicU64,
    policy: FailurePolicy,
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(FailurePolicy::default())
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Create a bus applying `policy` to handler failures.
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            handlers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Subscribe `handler` to `tag`.
    pub fn subscribe(&self, tag: E::Tag, handler: Arc<dyn EventHandler<E>>) -> Disposer {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(
            "subscribing handler (tag={}, handler={}, id={})",
            tag,
            handler.name(),
            id
        );
        self.handlers
            .write()
            .entry(tag)
            .or_default()
            .push(Subscription { id, handler });

        let handlers = Arc::downgrade(&self.handlers);
        Disposer::new(move || {
            let Some(handlers) = handlers.upgrade() else {
                return;
            };
            let mut handlers = handlers.write();
            if let Some(subscriptions) = handlers.get_mut(&tag) {
                subscriptions.retain(|subscription| subscription.id != id);
                if subscriptions.is_empty() {
                    handlers.remove(&tag);
                }
            }
        })
    }

    /// Deliver `event` to every handler subscribed to its tag.
    pub fn emit(&self, event: &E) -> EmitReport {
        let tag = event.tag();
        let handlers: Vec<Arc<dyn EventHandler<E>>> = self
            .handlers
            .read()
            .get(&tag)
            .map(|subscriptions| {
                subscriptions
                    .iter()
                    .map(|subscription| Arc::clone(&subscription.handler))
                    .collect()
            })
            .unwrap_or_default();
        if handlers.is_empty() {
            debug!("no handlers for event (tag={})", tag);
        }

        let mut report = EmitReport::default();
        for handler in handlers {
            match handler.handle(event) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    warn!(
                        "event handler failed (tag={}, handler={}, error={})",
                        tag,
                        handler.name(),
                        error
                    );
                    report.failures.push(HandlerFailure {
                        handler: handler.name().to_string(),
                        error,
                    });
                    if self.policy == FailurePolicy::Halt {
                        report.halted = true;
                        break;
                    }
                }
            }
        }
        report
    }

    /// Number of handlers currently subscribed to `tag`.
    pub fn handler_count(&self, tag: E::Tag) -> usize {
        self.handlers.read().get(&tag).map_or(0, Vec::len)
    }
}
