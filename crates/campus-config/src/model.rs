//! Configuration schema for the campus engine.

use campus_protocol::SliceName;
use serde::{Deserialize, Serialize};

/// Root config for the campus engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CampusConfig {
    #[serde(default, rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cascades: CascadeConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl CampusConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> CampusConfigBuilder {
        CampusConfigBuilder::new()
    }
}

/// Builder for assembling a `CampusConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct CampusConfigBuilder {
    config: CampusConfig,
}

impl CampusConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: CampusConfig::default(),
        }
    }

    /// Replace the engine configuration.
    pub fn engine(mut self, engine: EngineConfig) -> Self {
        self.config.engine = engine;
        self
    }

    /// Replace the cascade tuning.
    pub fn cascades(mut self, cascades: CascadeConfig) -> Self {
        self.config.cascades = cascades;
        self
    }

    /// Replace the persistence configuration.
    pub fn persistence(mut self, persistence: PersistenceConfig) -> Self {
        self.config.persistence = persistence;
        self
    }

    /// Finalize and return the built `CampusConfig`.
    pub fn build(self) -> CampusConfig {
        self.config
    }
}

/// Store and bus behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_activity_log_capacity")]
    pub activity_log_capacity: usize,
    #[serde(default)]
    pub handler_failures: FailurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            activity_log_capacity: default_activity_log_capacity(),
            handler_failures: FailurePolicy::default(),
        }
    }
}

/// Default number of activity entries retained.
fn default_activity_log_capacity() -> usize {
    50
}

/// What the bus does when a handler fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and keep delivering to the remaining handlers.
    #[default]
    Isolate,
    /// Stop delivering the event at the first failure.
    Halt,
}

/// Tuning for the derived writes produced by cascade handlers.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CascadeConfig {
    #[serde(default)]
    pub placeholder: PlaceholderScheduleConfig,
    #[serde(default)]
    pub attendance: AttendanceDeltas,
}

/// Placeholder calendar slot created for a new course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceholderScheduleConfig {
    #[serde(default = "default_start_offset_hours")]
    pub start_offset_hours: i64,
    #[serde(default = "default_duration_hours")]
    pub duration_hours: i64,
}

impl Default for PlaceholderScheduleConfig {
    fn default() -> Self {
        Self {
            start_offset_hours: default_start_offset_hours(),
            duration_hours: default_duration_hours(),
        }
    }
}

fn default_start_offset_hours() -> i64 {
    24
}

fn default_duration_hours() -> i64 {
    2
}

/// Attendance-rate adjustment per attendance mark.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceDeltas {
    #[serde(default = "default_present_delta")]
    pub present: f64,
    #[serde(default = "default_late_delta")]
    pub late: f64,
    #[serde(default = "default_absent_delta")]
    pub absent: f64,
}

impl Default for AttendanceDeltas {
    fn default() -> Self {
        Self {
            present: default_present_delta(),
            late: default_late_delta(),
            absent: default_absent_delta(),
        }
    }
}

fn default_present_delta() -> f64 {
    1.0
}

fn default_late_delta() -> f64 {
    0.5
}

fn default_absent_delta() -> f64 {
    -2.0
}

/// Best-effort local snapshot cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_persisted_slices")]
    pub slices: Vec<SliceName>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            slices: default_persisted_slices(),
        }
    }
}

/// Slices cached locally by default; the rest come from hydration.
fn default_persisted_slices() -> Vec<SliceName> {
    vec![SliceName::Onboarding, SliceName::ActivityLog]
}
