//! Test helpers shared across campus crates.

pub mod clock;
pub mod fixtures;
pub mod handlers;
pub mod persistence;

pub use clock::ManualClock;
pub use fixtures::{CourseBuilder, StudentBuilder, course, student};
pub use handlers::{FailingHandler, RecordingHandler};
pub use persistence::{FailingPersistence, MemoryPersistence};
