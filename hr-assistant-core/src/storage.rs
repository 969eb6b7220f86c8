//! Key-value persistence for chat state.
//!
//! The surface mirrors browser local storage so the same state blob can be
//! kept by the web front end or on disk by the terminal client. When the
//! on-disk store cannot be opened, [`open_storage`] falls back to memory and
//! the session simply does not survive a restart.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::secret::SecretCodec;
use crate::store::{ChatState, ConversationStore};

const STATE_KEY_PREFIX: &str = "hr-assistant:chat:";

pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    /// The key at `index` in storage order
    fn key(&self, index: usize) -> Option<String>;
    fn length(&self) -> usize;
}

/// Transient storage; contents die with the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.items.clear();
        Ok(())
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    fn length(&self) -> usize {
        self.items.len()
    }
}

/// Storage kept as one JSON object in a file, rewritten on every change
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    /// Opens the file, creating it (and its directory) if missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        let storage = Self { path, items };
        storage.flush()?;
        debug!(path = %storage.path.display(), items = storage.items.len(), "Opened file storage");
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_vec_pretty(&self.items)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if self.items.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.flush()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.items.keys().nth(index).cloned()
    }

    fn length(&self) -> usize {
        self.items.len()
    }
}

/// Opens file storage at `path`, or memory storage if that fails
pub fn open_storage(path: impl AsRef<Path>) -> Box<dyn KeyValueStorage> {
    let path = path.as_ref();
    match FileStorage::open(path) {
        Ok(storage) => {
            info!(path = %path.display(), "Persisting chat state to disk");
            Box::new(storage)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "File storage unavailable, falling back to memory");
            Box::new(MemoryStorage::new())
        }
    }
}

/// The storage key for a user's chat state
pub fn state_key(user_id: &str) -> String {
    format!("{STATE_KEY_PREFIX}{user_id}")
}

impl ChatState {
    /// Reads a user's saved state. A corrupt blob is logged and ignored.
    pub fn load(storage: &dyn KeyValueStorage, user_id: &str) -> Option<ChatState> {
        let raw = storage.get_item(&state_key(user_id))?;
        match serde_json::from_str::<ChatState>(&raw) {
            Ok(mut state) => {
                state.normalize();
                Some(state)
            }
            Err(e) => {
                warn!(user = user_id, error = %e, "Discarding unreadable chat state");
                None
            }
        }
    }

    pub fn save(&self, storage: &mut dyn KeyValueStorage, user_id: &str) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        storage
            .set_item(&state_key(user_id), &raw)
            .map_err(|e| Error::Storage(format!("saving chat state: {e}")))
    }
}

/// Restores a user's store from storage, or starts a fresh one.
///
/// `providers` is the current registry listing; it replaces whatever
/// provider list was saved, keeping saved keys.
pub fn restore_store(
    storage: &dyn KeyValueStorage,
    user_id: &str,
    codec: SecretCodec,
    providers: Vec<crate::provider::ProviderConfig>,
) -> ConversationStore {
    match ChatState::load(storage, user_id) {
        Some(state) => {
            info!(user = user_id, conversations = state.conversations().len(), "Restored chat state");
            let mut store = ConversationStore::from_state(codec, state);
            store.sync_providers(providers);
            store
        }
        None => ConversationStore::new(codec, providers),
    }
}
