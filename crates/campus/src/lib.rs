//! Public surface for the campus engine.
//!
//! Re-exports the building blocks and provides the helpers shared by the
//! `campus` binary: logging setup and JSONL script replay.

/// Re-export for convenience.
pub use campus_config as config;
pub use campus_core as core;
/// Re-export for convenience.
pub use campus_protocol as protocol;

pub mod script;

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Binaries are still expected
/// to call this early in startup to ensure log output is wired up.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}
