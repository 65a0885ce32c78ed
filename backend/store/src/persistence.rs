//! Persistence boundary for the activity store.
//!
//! The on-disk shape is the nested `community → channel → user → record`
//! JSON object the bot has always written to `audioData.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use trackwatch_core::{ActivityRecord, ChannelId, CommunityId, TrackwatchError, UserId};

/// Nested record map, keyed the same way it is serialized.
pub type StoreData =
    BTreeMap<CommunityId, BTreeMap<ChannelId, BTreeMap<UserId, ActivityRecord>>>;

/// Synchronous load/save of the whole store.
pub trait ActivityPersistence: Send + Sync {
    /// Load the stored records. Missing or unreadable data yields an empty map;
    /// this never fails.
    fn load(&self) -> StoreData;

    /// Replace the stored records with `data`.
    fn save(&self, data: &StoreData) -> Result<(), TrackwatchError>;
}

/// Stores the record map as pretty-printed JSON, replaced atomically on every save.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<StoreData>, TrackwatchError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            TrackwatchError::Persistence(format!("read {}: {e}", self.path.display()))
        })?;
        if raw.trim().is_empty() {
            return Ok(Some(StoreData::new()));
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| TrackwatchError::MalformedState(format!("{}: {e}", self.path.display())))
    }

    /// Keep a copy of unparseable data next to the original before it gets overwritten.
    fn quarantine(&self) {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        let target = PathBuf::from(name);
        if let Err(e) = fs::copy(&self.path, &target) {
            warn!(path = %target.display(), error = %e, "Failed to keep copy of corrupt data file");
        }
    }
}

impl ActivityPersistence for JsonFilePersistence {
    fn load(&self) -> StoreData {
        match self.read() {
            Ok(Some(data)) => {
                info!(path = %self.path.display(), communities = data.len(), "Loaded activity data");
                data
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "No data file found, starting fresh");
                StoreData::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load activity data, starting with an empty store");
                if matches!(e, TrackwatchError::MalformedState(_)) {
                    self.quarantine();
                }
                StoreData::new()
            }
        }
    }

    fn save(&self, data: &StoreData) -> Result<(), TrackwatchError> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            TrackwatchError::Persistence(format!("{what} {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| fail("create parent of", &e))?;
        }

        let json = serde_json::to_string_pretty(data).map_err(|e| fail("serialize", &e))?;

        // Write to a sibling temp file, then rename over the real one.
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json.as_bytes()).map_err(|e| fail("write temp for", &e))?;
        fs::rename(&tmp, &self.path).map_err(|e| fail("rename temp onto", &e))?;

        debug!(path = %self.path.display(), "Saved activity data");
        Ok(())
    }
}

/// Keeps the last saved map in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct InMemoryPersistence {
    data: Mutex<StoreData>,
    saves: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: StoreData) -> Self {
        Self {
            data: Mutex::new(data),
            ..Self::default()
        }
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub fn stored(&self) -> StoreData {
        self.data.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ActivityPersistence for InMemoryPersistence {
    fn load(&self) -> StoreData {
        self.stored()
    }

    fn save(&self, data: &StoreData) -> Result<(), TrackwatchError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(TrackwatchError::Persistence("in-memory backend set to fail".into()));
        }
        *self.data.lock().unwrap_or_else(|e| e.into_inner()) = data.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
