//! Per-tab persisted coordination state.
//!
//! Every coordinator mutation is mirrored into a [`TabSessionStore`] under the
//! tab's key so a reload can resume mid-flow. Stores only see opaque JSON
//! blobs; [`TabSession`] owns the encoding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TryOnError};
use crate::state_machine::CoordinatorState;

/// Key/value persistence scoped to one browser tab.
pub trait TabSessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, blob: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

impl<T: TabSessionStore + ?Sized> TabSessionStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        (**self).set(key, blob)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }
}

/// Generates a fresh key for a new tab.
pub fn new_tab_key() -> String {
    format!("tab-{}", Uuid::new_v4())
}

/// In-memory store, used by tests and the demo.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| TryOnError::Session("session store lock poisoned".into()))
    }
}

impl TabSessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), blob.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One JSON file per tab under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TryOnError::Session(format!("invalid tab key: {key:?}")));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl TabSessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, blob: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;
        // Write then rename so a crash never leaves a torn snapshot.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Where the user is in the try-on flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStep {
    #[default]
    ChooseItem,
    CapturePhoto,
    Processing,
    ShowResult,
}

/// Snapshot persisted for a tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSession {
    pub state: CoordinatorState,
    pub step: FlowStep,
    pub updated_at: DateTime<Utc>,
}

impl TabSession {
    pub fn new(state: CoordinatorState, step: FlowStep) -> Self {
        Self {
            state,
            step,
            updated_at: Utc::now(),
        }
    }

    pub fn load(store: &impl TabSessionStore, key: &str) -> Result<Option<Self>> {
        store
            .get(key)?
            .map(|blob| serde_json::from_str(&blob).map_err(TryOnError::from))
            .transpose()
    }

    pub fn save(&self, store: &impl TabSessionStore, key: &str) -> Result<()> {
        let blob = serde_json::to_string(self)?;
        store.set(key, &blob)
    }
}
