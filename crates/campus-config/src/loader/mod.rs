//! Layered configuration loader with requirement constraints.
//!
//! Discovers config layers (system/user/project/cwd/runtime), validates each
//! against the schema, merges them under optional requirement locks and
//! produces the effective `CampusConfig`.

mod layer_io;
mod merge;
mod schema;
mod utils;


use crate::{CampusConfig, ConfigError};
use log::{debug, info};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Config filename looked up in local layers.
const DEFAULT_CONFIG_FILE: &str = "campus.json5";
/// Config directory under the user's home.
const DEFAULT_CONFIG_DIR: &str = ".campus";
/// Marker files/dirs that identify a project root.
const DEFAULT_PROJECT_ROOT_MARKERS: &[&str] = &[".git"];

#[cfg(unix)]
const SYSTEM_CONFIG_PATH: &str = "/etc/campus/campus.json5";
#[cfg(unix)]
const SYSTEM_REQUIREMENTS_PATH: &str = "/etc/campus/requirements.json5";
#[cfg(windows)]
const SYSTEM_CONFIG_PATH: &str = "C:\\ProgramData\\campus\\campus.json5";
#[cfg(windows)]
const SYSTEM_REQUIREMENTS_PATH: &str = "C:\\ProgramData\\campus\\requirements.json5";

/// Effective config plus metadata about which layers were loaded.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    /// The merged, validated config.
    pub config: CampusConfig,
    /// Metadata for each layer that contributed.
    pub layers: Vec<ConfigLayer>,
}

/// Origin of a single config layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    /// Locked values that later layers cannot override.
    Requirements,
    /// System-wide configuration.
    System,
    /// User-specific configuration.
    User,
    /// Project root configuration.
    Project,
    /// Current working directory configuration.
    Cwd,
    /// Runtime overrides (highest precedence).
    Runtime,
}

impl ConfigLayerSource {
    /// Short label used in validation errors.
    pub fn label(self) -> &'static str {
        match self {
            ConfigLayerSource::Requirements => "requirements",
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Project => "project",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Runtime => "runtime",
        }
    }
}

/// Metadata about a loaded config layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

/// Options controlling layered config discovery and overrides.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    /// Working directory used to find local layers.
    pub cwd: PathBuf,
    /// System config path (defaults to `/etc/campus/campus.json5` on Unix).
    pub system_config_path: Option<PathBuf>,
    /// User config path (defaults to `~/.campus/campus.json5`).
    pub user_config_path: Option<PathBuf>,
    /// Requirements path holding locked settings.
    pub requirements_path: Option<PathBuf>,
    /// Runtime override config paths applied last, in order.
    pub runtime_paths: Vec<PathBuf>,
    /// Marker files/dirs used to detect the project root.
    pub project_root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    /// Create options with default layer locations for the provided cwd.
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: layer_io::default_system_config_path(),
            user_config_path: layer_io::default_user_config_path(),
            requirements_path: layer_io::default_requirements_path(),
            runtime_paths: Vec::new(),
            project_root_markers: DEFAULT_PROJECT_ROOT_MARKERS
                .iter()
                .map(|marker| marker.to_string())
                .collect(),
        }
    }

    /// Options without system, user, requirements or project layers.
    pub fn isolated(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: None,
            user_config_path: None,
            requirements_path: None,
            runtime_paths: Vec::new(),
            project_root_markers: Vec::new(),
        }
    }

    /// Add a runtime override config path that is applied last.
    pub fn with_runtime_path(mut self, path: impl AsRef<Path>) -> Self {
        self.runtime_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl CampusConfig {
    /// Load a single config file (no layering).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        info!("loading config (path={})", path.as_ref().display());
        let contents = fs::read_to_string(path)?;
        Self::load_from_str(&contents)
    }

    /// Load a single config from JSON5 contents (no layering).
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from raw contents (len={})", contents.len());
        let value: Value = json5::from_str(contents)?;
        config_from_value(value)
    }

    /// Load the layered config stack using the default layer locations.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    /// Load the layered config stack using explicit locations.
    ///
    /// Precedence (low -> high): system, user, project, cwd, runtime.
    /// Requirements seed the merge and lock every key they define.
    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let cwd = utils::normalize_path(&options.cwd)?;
        let mut layers = Vec::new();
        let mut overlays = Vec::new();
        let mut seen_paths = HashSet::new();

        let requirements = layer_io::load_optional_layer(
            ConfigLayerSource::Requirements,
            options.requirements_path.as_deref(),
        )?;
        if let Some(layer) = &requirements {
            layers.push(layer.meta.clone());
        }

        let mut candidates = vec![
            (ConfigLayerSource::System, options.system_config_path.clone()),
            (ConfigLayerSource::User, options.user_config_path.clone()),
        ];
        match utils::find_project_root(&cwd, &options.project_root_markers) {
            Some(root) => {
                debug!("resolved project root (path={})", root.display());
                candidates.push((
                    ConfigLayerSource::Project,
                    Some(root.join(DEFAULT_CONFIG_FILE)),
                ));
            }
            None => debug!("project root not found; skipping project layer"),
        }
        candidates.push((ConfigLayerSource::Cwd, Some(cwd.join(DEFAULT_CONFIG_FILE))));

        for (source, path) in candidates {
            let Some(path) = path else {
                continue;
            };
            if !seen_paths.insert(utils::unique_path(&path)) {
                debug!(
                    "skipping duplicate layer (source={:?}, path={})",
                    source,
                    path.display()
                );
                continue;
            }
            if let Some(layer) = layer_io::load_optional_layer(source, Some(path.as_path()))? {
                layers.push(layer.meta.clone());
                overlays.push(layer);
            }
        }

        for runtime_path in &options.runtime_paths {
            let layer = layer_io::load_required_layer(ConfigLayerSource::Runtime, runtime_path)?;
            layers.push(layer.meta.clone());
            overlays.push(layer);
        }

        let locks = requirements.map(|layer| layer.value);
        let mut merged = Value::Object(serde_json::Map::new());
        if let Some(locks) = &locks {
            merge::merge_json_values(&mut merged, locks);
        }
        for layer in &overlays {
            merge::merge_json_with_constraints(&mut merged, &layer.value, locks.as_ref());
        }

        let config = config_from_value(merged)?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    /// Validate invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.activity_log_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.activity_log_capacity must be at least 1".to_string(),
            ));
        }
        if self.cascades.placeholder.duration_hours < 1 {
            return Err(ConfigError::Invalid(
                "cascades.placeholder.duration_hours must be at least 1".to_string(),
            ));
        }
        let deltas = &self.cascades.attendance;
        if ![deltas.present, deltas.late, deltas.absent]
            .iter()
            .all(|delta| delta.is_finite())
        {
            return Err(ConfigError::Invalid(
                "cascades.attendance deltas must be finite".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for slice in &self.persistence.slices {
            if !seen.insert(*slice) {
                return Err(ConfigError::Invalid(format!(
                    "persistence.slices lists `{slice}` twice"
                )));
            }
        }
        Ok(())
    }
}

/// A config layer read from disk.
#[derive(Debug, Clone)]
struct LoadedLayer {
    meta: ConfigLayer,
    value: Value,
}

fn config_from_value(value: Value) -> Result<CampusConfig, ConfigError> {
    schema::validate_layer_schema(&value, "effective")?;
    let config: CampusConfig = serde_json::from_value(value)?;
    config.validate()?;
    Ok(config)
}
