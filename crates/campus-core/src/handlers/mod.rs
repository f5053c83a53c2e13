//! Canonical handlers that turn domain events into state writes.
//!
//! Each event tag gets one cascade handler, whose writes commit as a single
//! transition, followed by the activity recorder that appends the audit
//! entry. The recorder runs as its own subscription so a failed cascade is
//! still audited under the isolate policy.

mod cascades;

use crate::bus::{EventBus, EventHandler};
use crate::clock::Clock;
use crate::disposer::Disposer;
use crate::error::HandlerError;
use crate::store::{Store, Transaction};
use campus_config::CascadeConfig;
use campus_protocol::{Action, ActivityEntry, DomainEvent, EventTag};
use log::{debug, info};
use std::sync::Arc;
use uuid::Uuid;

/// Cascade body for one event tag.
type CascadeFn =
    fn(&DomainEvent, &HandlerContext, &mut Transaction<'_>) -> Result<(), HandlerError>;

/// Shared inputs of every handler.
#[derive(Clone)]
pub struct HandlerContext {
    pub clock: Arc<dyn Clock>,
    pub cascades: CascadeConfig,
}

impl HandlerContext {
    pub fn new(clock: Arc<dyn Clock>, cascades: CascadeConfig) -> Self {
        Self { clock, cascades }
    }

    /// Fresh id for a generated entity.
    pub fn new_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", Uuid::new_v4())
    }
}

/// Disposers for every handler registered by [`register_handlers`].
#[derive(Debug, Default)]
pub struct HandlerRegistration {
    disposers: Vec<Disposer>,
}

impl HandlerRegistration {
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Unsubscribe everything; returns how many subscriptions were live.
    pub fn dispose_all(&self) -> usize {
        let disposed = self
            .disposers
            .iter()
            .filter(|disposer| disposer.dispose())
            .count();
        info!("handlers disposed (count={})", disposed);
        disposed
    }
}

/// Subscribe the cascade handler and the activity recorder for every tag.
///
/// Each tag gets exactly one cascade, the canonical handler for that event.
/// The recorder is a second subscription on purpose: it commits the audit
/// entry in its own transition after the cascade, so a cascade that fails and
/// rolls back under the isolate policy still leaves its activity entry.
/// Observers therefore see two versions per event, the cascade's writes and
/// then the audit entry.
pub fn register_handlers(
    bus: &EventBus<DomainEvent>,
    store: Arc<Store>,
    ctx: HandlerContext,
) -> HandlerRegistration {
    let ctx = Arc::new(ctx);
    let recorder: Arc<ActivityRecorder> = Arc::new(ActivityRecorder {
        store: Arc::clone(&store),
        ctx: Arc::clone(&ctx),
    });
    let mut disposers = Vec::with_capacity(EventTag::ALL.len() * 2);
    for tag in EventTag::ALL {
        let cascade = CascadeHandler {
            tag,
            name: format!("cascade:{tag}"),
            store: Arc::clone(&store),
            ctx: Arc::clone(&ctx),
            cascade: cascades::cascade_for(tag),
        };
        disposers.push(bus.subscribe(tag, Arc::new(cascade)));
        disposers.push(bus.subscribe(tag, recorder.clone()));
    }
    info!("handlers registered (count={})", disposers.len());
    HandlerRegistration { disposers }
}

/// Runs one tag's cascade inside a store transaction.
struct CascadeHandler {
    tag: EventTag,
    name: String,
    store: Arc<Store>,
    ctx: Arc<HandlerContext>,
    cascade: CascadeFn,
}

impl EventHandler<DomainEvent> for CascadeHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        if event.tag() != self.tag {
            return Err(HandlerError::UnexpectedEvent {
                expected: self.tag,
                actual: event.tag(),
            });
        }
        let dispatched = self.store.transact(|tx| {
            (self.cascade)(event, &self.ctx, tx)?;
            Ok::<_, HandlerError>(tx.dispatched())
        })?;
        debug!(
            "cascade applied (tag={}, institution_id={}, actions={})",
            self.tag,
            event.institution_id(),
            dispatched
        );
        Ok(())
    }
}

/// Appends one activity entry per processed event.
struct ActivityRecorder {
    store: Arc<Store>,
    ctx: Arc<HandlerContext>,
}

impl EventHandler<DomainEvent> for ActivityRecorder {
    fn name(&self) -> &str {
        "activity-recorder"
    }

    fn handle(&self, event: &DomainEvent) -> Result<(), HandlerError> {
        let entry = ActivityEntry {
            id: self.ctx.new_id("log"),
            event_tag: event.tag(),
            message: event.describe(),
            timestamp: self.ctx.clock.now(),
        };
        self.store.dispatch(Action::LogActivity(entry))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::reducer::Reducer;
    use campus_protocol::{CourseSuspension, Payment};
    use pretty_assertions::assert_eq;

    fn setup() -> (EventBus<DomainEvent>, Arc<Store>, HandlerRegistration) {
        let bus = EventBus::default();
        let store = Arc::new(Store::new(Reducer::default()));
        let ctx = HandlerContext::new(Arc::new(SystemClock), CascadeConfig::default());
        let registration = register_handlers(&bus, Arc::clone(&store), ctx);
        (bus, store, registration)
    }

    fn payment() -> DomainEvent {
        DomainEvent::PaymentRecorded(Payment {
            payment_id: "p1".to_string(),
            institution_id: "t1".to_string(),
            student_id: "s1".to_string(),
            student_name: "Ana".to_string(),
            amount: 120.0,
            currency: "EUR".to_string(),
            concept: None,
        })
    }

    #[test]
    fn registers_cascade_and_recorder_per_tag() {
        let (bus, _store, registration) = setup();
        assert_eq!(registration.len(), EventTag::ALL.len() * 2);
        for tag in EventTag::ALL {
            assert_eq!(bus.handler_count(tag), 2);
        }
        assert_eq!(registration.dispose_all(), EventTag::ALL.len() * 2);
        assert_eq!(registration.dispose_all(), 0);
        assert_eq!(bus.handler_count(EventTag::PaymentRecorded), 0);
    }

    #[test]
    fn audit_entry_survives_a_failed_cascade() {
        let (bus, store, _registration) = setup();
        let event = DomainEvent::CourseSuspended(CourseSuspension {
            course_id: "missing".to_string(),
            institution_id: "t1".to_string(),
            reason: None,
        });
        let report = bus.emit(&event);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].handler, "cascade:course_suspended");
        let state = store.snapshot();
        assert!(state.notifications.is_empty());
        assert_eq!(state.activity_log.len(), 1);
        assert_eq!(state.activity_log[0].message, "Course missing suspended");
    }

    #[test]
    fn disposed_handlers_stop_writing() {
        let (bus, store, registration) = setup();
        bus.emit(&payment());
        registration.dispose_all();
        bus.emit(&payment());
        let state = store.snapshot();
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.activity_log.len(), 1);
    }
}
