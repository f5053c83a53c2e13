use campus_core::{PersistenceError, PersistencePort};
use campus_protocol::{AppState, PartialAppState, SliceName};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory port keeping the last saved projection.
#[derive(Debug)]
pub struct MemoryPersistence {
    slices: Vec<SliceName>,
    stored: Mutex<Option<PartialAppState>>,
    saves: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new(slices: Vec<SliceName>) -> Self {
        Self {
            slices,
            stored: Mutex::new(None),
            saves: AtomicUsize::new(0),
        }
    }

    /// Port that already holds `partial`.
    pub fn seeded(slices: Vec<SliceName>, partial: PartialAppState) -> Self {
        let port = Self::new(slices);
        *port.stored.lock() = Some(partial);
        port
    }

    pub fn stored(&self) -> Option<PartialAppState> {
        self.stored.lock().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl PersistencePort for MemoryPersistence {
    fn load(&self) -> Result<Option<PartialAppState>, PersistenceError> {
        Ok(self.stored.lock().clone())
    }

    fn save(&self, state: &AppState) -> Result<(), PersistenceError> {
        *self.stored.lock() = Some(state.project(&self.slices));
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Port whose every call fails.
#[derive(Debug, Default)]
pub struct FailingPersistence {
    attempts: AtomicUsize,
}

impl FailingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of load and save calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl PersistencePort for FailingPersistence {
    fn load(&self) -> Result<Option<PartialAppState>, PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::Backend("storage unavailable".to_string()))
    }

    fn save(&self, _state: &AppState) -> Result<(), PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PersistenceError::Backend("storage unavailable".to_string()))
    }
}
