//! Core state-synchronization primitives for the campus engine.
//!
//! This crate owns the store and its reducer, the event bus, the cascade
//! handler registry, tenant scoping, the persistence port and the `Engine`
//! facade that wires them together.

pub mod bus;
pub mod clock;
pub mod disposer;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod persistence;
pub mod reducer;
pub mod scope;
pub mod store;

pub use bus::{BusEvent, EmitReport, EventBus, EventHandler, HandlerFailure};
pub use clock::{Clock, SystemClock};
pub use disposer::Disposer;
pub use engine::Engine;
pub use error::{CampusCoreError, HandlerError, PersistenceError};
pub use handlers::{HandlerContext, HandlerRegistration, register_handlers};
pub use persistence::{JsonFilePersistence, PersistencePort};
pub use reducer::Reducer;
pub use scope::{ScopedState, TenantScope};
pub use store::{StateObserver, Store, Transaction};
