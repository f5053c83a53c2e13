//! Best-effort local snapshot cache.

use crate::error::PersistenceError;
use campus_config::PersistenceConfig;
use campus_protocol::{AppState, PartialAppState, SliceName};
use directories::UserDirs;
use log::{debug, info};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the user's home holding the default snapshot file.
const DEFAULT_STATE_DIR: &str = ".campus";
/// Default snapshot filename.
const DEFAULT_STATE_FILE: &str = "state.json";

/// Pluggable storage for a subset of the application state.
///
/// Failures are reported to the caller, which logs them and carries on; the
/// in-memory engine never depends on a port succeeding.
pub trait PersistencePort: Send + Sync {
    /// Read the cached slices, `None` when nothing was stored yet.
    fn load(&self) -> Result<Option<PartialAppState>, PersistenceError>;
    /// Store the slices this port is responsible for.
    fn save(&self, state: &AppState) -> Result<(), PersistenceError>;
}

/// JSON file holding the configured slices of the latest snapshot.
pub struct JsonFilePersistence {
    path: PathBuf,
    slices: Vec<SliceName>,
    write_lock: Mutex<()>,
}

impl JsonFilePersistence {
    /// Create a port writing `slices` to `path`.
    pub fn new(path: impl AsRef<Path>, slices: Vec<SliceName>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            slices,
            write_lock: Mutex::new(()),
        }
    }

    /// Build the port described by config, or `None` when disabled.
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let path = match &config.path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        info!(
            "json persistence enabled (path={}, slices={})",
            path.display(),
            config.slices.len()
        );
        Some(Self::new(path, config.slices.clone()))
    }

    /// `~/.campus/state.json`, when a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        UserDirs::new().map(|dirs| {
            dirs.home_dir()
                .join(DEFAULT_STATE_DIR)
                .join(DEFAULT_STATE_FILE)
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn slices(&self) -> &[SliceName] {
        &self.slices
    }
}

impl PersistencePort for JsonFilePersistence {
    fn load(&self) -> Result<Option<PartialAppState>, PersistenceError> {
        if !self.path.exists() {
            debug!("no cached state (path={})", self.path.display());
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let stored: PartialAppState = serde_json::from_str(&contents)?;
        let partial = retain_slices(stored, &self.slices);
        debug!(
            "cached state loaded (path={}, slices={})",
            self.path.display(),
            partial.slices().len()
        );
        Ok(Some(partial))
    }

    fn save(&self, state: &AppState) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_vec_pretty(&state.project(&self.slices))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            "state cached (path={}, version={})",
            self.path.display(),
            state.version
        );
        Ok(())
    }
}

/// Drop slices this port does not own.
fn retain_slices(mut partial: PartialAppState, slices: &[SliceName]) -> PartialAppState {
    for slice in SliceName::ALL {
        if slices.contains(&slice) {
            continue;
        }
        match slice {
            SliceName::Courses => partial.courses = None,
            SliceName::Aulas => partial.aulas = None,
            SliceName::Students => partial.students = None,
            SliceName::Events => partial.events = None,
            SliceName::Feed => partial.feed = None,
            SliceName::Notifications => partial.notifications = None,
            SliceName::Conversations => partial.conversations = None,
            SliceName::Communications => partial.communications = None,
            SliceName::ActivityLog => partial.activity_log = None,
            SliceName::Onboarding => partial.onboarding = None,
        }
    }
    partial
}

#[cfg(test)]
mod tests {
    use super::{JsonFilePersistence, PersistencePort};
    use campus_config::PersistenceConfig;
    use campus_protocol::{AppState, OnboardingProgress, SliceName};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn onboarded_state() -> AppState {
        AppState {
            version: 3,
            onboarding: Arc::new(OnboardingProgress {
                completed_steps: vec!["profile".to_string()],
                is_dismissed: false,
            }),
            ..AppState::default()
        }
    }

    #[test]
    fn saves_and_loads_configured_slices() {
        let temp = tempdir().expect("tempdir");
        let port = JsonFilePersistence::new(
            temp.path().join("nested").join("state.json"),
            vec![SliceName::Onboarding],
        );
        assert_eq!(port.load().expect("load"), None);

        port.save(&onboarded_state()).expect("save");
        let loaded = port.load().expect("load").expect("cached");
        assert_eq!(loaded.slices(), vec![SliceName::Onboarding]);
        assert_eq!(
            loaded.onboarding.expect("onboarding").completed_steps,
            vec!["profile".to_string()]
        );
        assert!(!temp.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn load_ignores_slices_it_does_not_own() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        fs::write(
            &path,
            r#"{ "courses": [], "onboarding": { "completed_steps": [], "is_dismissed": true } }"#,
        )
        .expect("write");
        let port = JsonFilePersistence::new(&path, vec![SliceName::Onboarding]);
        let loaded = port.load().expect("load").expect("cached");
        assert_eq!(loaded.courses, None);
        assert!(loaded.onboarding.expect("onboarding").is_dismissed);
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        fs::write(&path, "not json").expect("write");
        let port = JsonFilePersistence::new(&path, vec![SliceName::ActivityLog]);
        assert!(port.load().is_err());
    }

    #[test]
    fn disabled_config_builds_no_port() {
        assert!(JsonFilePersistence::from_config(&PersistenceConfig::default()).is_none());

        let config = PersistenceConfig {
            enabled: true,
            path: Some("/tmp/campus-state.json".to_string()),
            slices: vec![SliceName::ActivityLog],
        };
        let port = JsonFilePersistence::from_config(&config).expect("port");
        assert_eq!(port.slices(), &[SliceName::ActivityLog]);
    }
}
