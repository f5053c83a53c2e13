use campus_core::{EventHandler, HandlerError};
use parking_lot::Mutex;

/// Handler that records every event it receives.
pub struct RecordingHandler<E> {
    name: String,
    events: Mutex<Vec<E>>,
}

impl<E: Clone> RecordingHandler<E> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

impl<E: Clone + Send + Sync> EventHandler<E> for RecordingHandler<E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &E) -> Result<(), HandlerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// Handler that always fails with a fixed message.
pub struct FailingHandler {
    name: String,
    message: String,
}

impl FailingHandler {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl<E> EventHandler<E> for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, _event: &E) -> Result<(), HandlerError> {
        Err(HandlerError::Failed(self.message.clone()))
    }
}
