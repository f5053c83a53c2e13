//! Single-writer store holding the current application snapshot.

use crate::disposer::Disposer;
use crate::persistence::PersistencePort;
use crate::reducer::Reducer;
use campus_protocol::{Action, ActionError, AppState, DecodedAction, PartialAppState, decode_action};
use log::{debug, info, warn};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Receives every committed snapshot.
pub trait StateObserver: Send + Sync {
    fn on_state(&self, state: &Arc<AppState>);
}

impl<F> StateObserver for F
where
    F: Fn(&Arc<AppState>) + Send + Sync,
{
    fn on_state(&self, state: &Arc<AppState>) {
        self(state)
    }
}

type ObserverList = Mutex<Vec<(u64, Arc<dyn StateObserver>)>>;

/// Owner of the application state.
///
/// The only way to change state is through [`Store::dispatch`] or
/// [`Store::transact`]; readers get immutable `Arc<AppState>` snapshots.
/// Writers are serialized, and observers plus the persistence port run under
/// the writer lock so they see commits in order. The lock is reentrant: an
/// observer may dispatch from the same thread.
pub struct Store {
    reducer: Reducer,
    state: RwLock<Arc<AppState>>,
    writer: ReentrantMutex<()>,
    observers: Arc<ObserverList>,
    next_observer: AtomicU64,
    persistence: Option<Arc<dyn PersistencePort>>,
}

impl Store {
    /// Create an empty store.
    pub fn new(reducer: Reducer) -> Self {
        Self::with_state(reducer, AppState::default())
    }

    /// Create a store seeded with `initial`.
    pub fn with_state(reducer: Reducer, initial: AppState) -> Self {
        Self {
            reducer,
            state: RwLock::new(Arc::new(initial)),
            writer: ReentrantMutex::new(()),
            observers: Arc::new(Mutex::new(Vec::new())),
            next_observer: AtomicU64::new(0),
            persistence: None,
        }
    }

    /// Save every committed snapshot through `port`.
    pub fn with_persistence(mut self, port: Arc<dyn PersistencePort>) -> Self {
        self.persistence = Some(port);
        self
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.state.read().clone()
    }

    /// Validate and apply a single action.
    pub fn dispatch(&self, action: Action) -> Result<Arc<AppState>, ActionError> {
        self.transact(|tx| {
            tx.dispatch(action)?;
            Ok(tx.snapshot())
        })
    }

    /// Decode and apply a raw `{type, payload}` action.
    ///
    /// Unknown action types leave the state untouched.
    pub fn dispatch_value(&self, value: &Value) -> Result<Arc<AppState>, ActionError> {
        match decode_action(value)? {
            DecodedAction::Known(action) => self.dispatch(action),
            DecodedAction::Unknown(tag) => {
                debug!("ignoring unknown action (type={})", tag);
                Ok(self.snapshot())
            }
        }
    }

    /// Replace the provided slices.
    pub fn hydrate(&self, partial: PartialAppState) -> Result<Arc<AppState>, ActionError> {
        info!("hydrating state (slices={:?})", partial.slices());
        self.dispatch(Action::HydrateState(partial))
    }

    /// Run several dispatches as one atomic transition.
    ///
    /// The closure works on a private copy of the current snapshot; if it
    /// returns `Err` nothing is committed and observers are not notified.
    pub fn transact<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    {
        let _writer = self.writer.lock();
        let (value, committed) = {
            let base = self.snapshot();
            let mut tx = Transaction {
                reducer: &self.reducer,
                working: Arc::clone(&base),
                dispatched: 0,
            };
            let value = match f(&mut tx) {
                Ok(value) => value,
                Err(err) => {
                    debug!(
                        "transaction rolled back (dispatched={}, version={})",
                        tx.dispatched, base.version
                    );
                    return Err(err);
                }
            };
            if Arc::ptr_eq(&base, &tx.working) {
                return Ok(value);
            }
            *self.state.write() = Arc::clone(&tx.working);
            debug!(
                "state committed (version={}, dispatched={})",
                tx.working.version, tx.dispatched
            );
            (value, tx.working)
        };
        self.after_commit(&committed);
        Ok(value)
    }

    /// Register an observer for committed snapshots.
    pub fn subscribe(&self, observer: impl StateObserver + 'static) -> Disposer {
        let id = self.next_observer.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, Arc::new(observer)));
        let observers = Arc::downgrade(&self.observers);
        Disposer::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers.lock().retain(|(observer_id, _)| *observer_id != id);
            }
        })
    }

    /// Hydrate from the persistence port, if any. Failures are logged.
    pub fn restore(&self) -> Option<Arc<AppState>> {
        let port = self.persistence.as_ref()?;
        let partial = match port.load() {
            Ok(Some(partial)) => partial,
            Ok(None) => return None,
            Err(err) => {
                warn!("failed to load cached state (error={})", err);
                return None;
            }
        };
        match self.hydrate(partial) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!("discarding invalid cached state (error={})", err);
                None
            }
        }
    }

    fn after_commit(&self, state: &Arc<AppState>) {
        let observers: Vec<_> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer.on_state(state);
        }
        // An observer may have committed again; cache the newest snapshot.
        if let Some(port) = &self.persistence {
            let latest = self.snapshot();
            if let Err(err) = port.save(&latest) {
                warn!(
                    "failed to cache state (version={}, error={})",
                    latest.version, err
                );
            }
        }
    }
}

/// Working copy of the state inside [`Store::transact`].
pub struct Transaction<'a> {
    reducer: &'a Reducer,
    working: Arc<AppState>,
    dispatched: usize,
}

impl Transaction<'_> {
    /// Validate and apply an action to the working copy.
    pub fn dispatch(&mut self, action: Action) -> Result<(), ActionError> {
        action.validate()?;
        self.working = self.reducer.apply(&self.working, &action);
        self.dispatched += 1;
        Ok(())
    }

    /// Working state including this transaction's writes.
    pub fn state(&self) -> &AppState {
        &self.working
    }

    pub fn snapshot(&self) -> Arc<AppState> {
        Arc::clone(&self.working)
    }

    /// Number of actions applied so far.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }
}
