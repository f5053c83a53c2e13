//! Engine facade wiring config, store, bus and handlers together.

use crate::bus::{EmitReport, EventBus};
use crate::clock::{Clock, SystemClock};
use crate::disposer::Disposer;
use crate::error::CampusCoreError;
use crate::handlers::{HandlerContext, HandlerRegistration, register_handlers};
use crate::persistence::{JsonFilePersistence, PersistencePort};
use crate::reducer::Reducer;
use crate::scope::{ScopedState, TenantScope};
use crate::store::{StateObserver, Store};
use campus_config::CampusConfig;
use campus_protocol::{Action, AppState, DomainEvent, PartialAppState};
use log::{debug, info};
use parking_lot::ReentrantMutex;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// One engine instance per session: a store, its bus and the registered
/// cascade handlers.
///
/// Emits are serialized: an event's whole fan-out, cascade and audit entry
/// included, finishes before another thread's event is delivered.
pub struct Engine {
    config: CampusConfig,
    store: Arc<Store>,
    bus: EventBus<DomainEvent>,
    emitting: ReentrantMutex<()>,
    registration: HandlerRegistration,
    shut_down: AtomicBool,
}

impl Engine {
    /// Build an engine with the wall clock and the configured persistence.
    pub fn new(config: CampusConfig) -> Result<Self, CampusCoreError> {
        let persistence = JsonFilePersistence::from_config(&config.persistence)
            .map(|port| Arc::new(port) as Arc<dyn PersistencePort>);
        Self::with_parts(config, Arc::new(SystemClock), persistence)
    }

    /// Build an engine from explicit collaborators.
    ///
    /// Handlers are registered exactly once here; cached state is restored
    /// best-effort before the engine is returned.
    pub fn with_parts(
        config: CampusConfig,
        clock: Arc<dyn Clock>,
        persistence: Option<Arc<dyn PersistencePort>>,
    ) -> Result<Self, CampusCoreError> {
        config.validate()?;
        let mut store = Store::new(Reducer::new(config.engine.activity_log_capacity));
        if let Some(port) = persistence {
            store = store.with_persistence(port);
        }
        let store = Arc::new(store);
        let bus = EventBus::new(config.engine.handler_failures);
        let ctx = HandlerContext::new(clock, config.cascades.clone());
        let registration = register_handlers(&bus, Arc::clone(&store), ctx);
        if let Some(state) = store.restore() {
            info!("restored cached state (version={})", state.version);
        }
        info!(
            "engine ready (activity_log_capacity={}, handler_failures={:?})",
            config.engine.activity_log_capacity, config.engine.handler_failures
        );
        Ok(Self {
            config,
            store,
            bus,
            emitting: ReentrantMutex::new(()),
            registration,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &CampusConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Bus used by the cascade handlers; extra subscribers may attach here.
    pub fn bus(&self) -> &EventBus<DomainEvent> {
        &self.bus
    }

    /// Apply a direct write.
    pub fn dispatch(&self, action: Action) -> Result<Arc<AppState>, CampusCoreError> {
        self.ensure_running()?;
        Ok(self.store.dispatch(action)?)
    }

    /// Apply a raw JSON action; unknown types are ignored.
    pub fn dispatch_value(&self, value: &Value) -> Result<Arc<AppState>, CampusCoreError> {
        self.ensure_running()?;
        Ok(self.store.dispatch_value(value)?)
    }

    /// Publish a domain event and run its cascade.
    pub fn emit(&self, event: &DomainEvent) -> Result<EmitReport, CampusCoreError> {
        self.ensure_running()?;
        debug!(
            "emitting event (tag={}, institution_id={})",
            event.tag(),
            event.institution_id()
        );
        let _emitting = self.emitting.lock();
        Ok(self.bus.emit(event))
    }

    /// Replace the provided slices with server data.
    pub fn hydrate(&self, partial: PartialAppState) -> Result<Arc<AppState>, CampusCoreError> {
        self.ensure_running()?;
        Ok(self.store.hydrate(partial)?)
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        self.store.snapshot()
    }

    /// Current snapshot narrowed to one institution.
    pub fn scoped(&self, institution_id: &str) -> ScopedState {
        TenantScope::new(institution_id).select(&self.store.snapshot())
    }

    pub fn subscribe_state(&self, observer: impl StateObserver + 'static) -> Disposer {
        self.store.subscribe(observer)
    }

    /// Dispose every handler. Later writes fail with `ShutDown`.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let disposed = self.registration.dispose_all();
        info!("engine shut down (handlers={})", disposed);
        disposed
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), CampusCoreError> {
        if self.is_shut_down() {
            Err(CampusCoreError::ShutDown)
        } else {
            Ok(())
        }
    }
}
