//! Handles that undo a subscription.

use parking_lot::Mutex;
use std::fmt;

/// Undo handle returned by `subscribe` calls.
///
/// Dropping a disposer does not unsubscribe; callers retain it and call
/// [`Disposer::dispose`] on teardown. Disposing twice is a no-op.
pub struct Disposer {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Disposer {
    /// Wrap a teardown closure.
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Run the teardown. Returns false if it already ran.
    pub fn dispose(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    /// Whether `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Disposer;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn dispose_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let disposer = Disposer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(disposer.dispose());
        assert!(!disposer.dispose());
        assert!(disposer.is_disposed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_does_not_dispose() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        drop(Disposer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
