use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::config::CHANNEL_CAPACITY;
use crate::error::{AppError, Result};
use crate::store::{SharedStore, StoreChange, WriterId};

const EXTENSION: &str = "json";

/// Directory-backed store: one `<key>.json` file per key. Processes pointed at
/// the same directory share state; a polling watcher turns writes made by
/// other processes into `StoreChange`s with no origin.
pub struct FileStore {
    dir: PathBuf,
    /// key → content last written or observed by this process.
    seen: DashMap<String, Option<String>>,
    changes: broadcast::Sender<StoreChange>,
    /// Serializes own writes against polling so a half-applied write is never
    /// reported as foreign.
    io_lock: Mutex<()>,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Arc<Self>> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        let store = Self {
            seen: DashMap::new(),
            changes,
            io_lock: Mutex::new(()),
            dir,
        };
        for (key, value) in store.read_all()? {
            store.seen.insert(key, Some(value));
        }
        debug!(dir = %store.dir.display(), keys = store.seen.len(), "file store opened");
        Ok(Arc::new(store))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Compare the directory with what this process last saw and publish a
    /// change for every key another process wrote or removed.
    /// Returns the number of changes published.
    pub fn poll_external(&self) -> Result<usize> {
        let _guard = self.io_lock.lock().unwrap_or_else(|e| e.into_inner());
        let on_disk = self.read_all()?;

        let mut changed: Vec<(String, Option<String>)> = Vec::new();
        for (key, value) in &on_disk {
            let known = self.seen.get(key).and_then(|v| v.value().clone());
            if known.as_deref() != Some(value.as_str()) {
                changed.push((key.clone(), Some(value.clone())));
            }
        }
        let removed: Vec<String> = self
            .seen
            .iter()
            .filter(|e| e.value().is_some() && !on_disk.contains_key(e.key()))
            .map(|e| e.key().clone())
            .collect();
        changed.extend(removed.into_iter().map(|k| (k, None)));

        for (key, new_value) in &changed {
            self.seen.insert(key.clone(), new_value.clone());
            let _ = self.changes.send(StoreChange {
                key: key.clone(),
                new_value: new_value.clone(),
                origin: None,
            });
        }
        Ok(changed.len())
    }

    /// Poll for foreign writes every `every` until the task is aborted.
    pub fn spawn_watcher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match store.poll_external() {
                    Ok(0) => {}
                    Ok(n) => debug!(changes = n, "file store picked up external writes"),
                    Err(e) => warn!("file store poll failed: {e}"),
                }
            }
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid store key: {key:?}"),
            )));
        }
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(value) => {
                    out.insert(key.to_string(), value);
                }
                // Removed between listing and reading.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(out)
    }
}

impl SharedStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key).ok()?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Some(value),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, "file store read failed: {e}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str, origin: WriterId) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));

        let _guard = self.io_lock.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;

        let previous = self.seen.insert(key.to_string(), Some(value.to_string()));
        if previous.flatten().as_deref() != Some(value) {
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
                new_value: Some(value.to_string()),
                origin: Some(origin),
            });
        }
        Ok(())
    }

    fn remove(&self, key: &str, origin: WriterId) -> Result<()> {
        let path = self.path_for(key)?;

        let _guard = self.io_lock.lock().unwrap_or_else(|e| e.into_inner());
        let existed = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        self.seen.insert(key.to_string(), None);
        if existed {
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
                new_value: None,
                origin: Some(origin),
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
