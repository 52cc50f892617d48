//! Durable key/value storage for the session collection.
//!
//! The session store never touches the filesystem directly; it is handed a
//! [`PersistentStore`] and reads and writes two string entries through it:
//! [`SESSIONS_KEY`] holds the serialized collection and [`ACTIVE_SESSION_KEY`]
//! holds the raw id of the active session.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ChatSession;

/// Key of the serialized session collection.
pub const SESSIONS_KEY: &str = "chatSessions";

/// Key of the active session id.
pub const ACTIVE_SESSION_KEY: &str = "currentSessionId";

/// Key an unreadable collection is moved to before anything overwrites it.
pub const UNREADABLE_SESSIONS_KEY: &str = "chatSessions-unreadable";

/// Current version of the persisted collection layout.
pub const STORAGE_VERSION: u32 = 1;

/// A string-keyed store that outlives the process.
pub trait PersistentStore: Send {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing what was there.
    fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the value stored under `key`; missing keys are not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: PersistentStore + Sync + ?Sized> PersistentStore for &S {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        (**self).save(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/////////////////////////////////////////// Layout ///////////////////////////////////////////

#[derive(Serialize)]
struct SessionsEnvelopeRef<'a> {
    version: u32,
    sessions: &'a [ChatSession],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredSessions {
    Versioned { version: u32, sessions: Vec<ChatSession> },
    Legacy(Vec<ChatSession>),
}

/// Serialize a session collection in the current versioned layout.
pub fn encode_sessions(sessions: &[ChatSession]) -> Result<String> {
    let envelope = SessionsEnvelopeRef {
        version: STORAGE_VERSION,
        sessions,
    };
    serde_json::to_string(&envelope).map_err(|err| {
        Error::serialization("failed to serialize sessions", Some(Box::new(err)))
    })
}

/// Parse a stored session collection.
///
/// Accepts the versioned envelope as well as the bare array written before
/// the layout was versioned.
pub fn decode_sessions(raw: &str) -> Result<Vec<ChatSession>> {
    let stored: StoredSessions = serde_json::from_str(raw)
        .map_err(|err| Error::serialization("failed to parse sessions", Some(Box::new(err))))?;
    match stored {
        StoredSessions::Versioned { version, sessions } if version == STORAGE_VERSION => {
            Ok(sessions)
        }
        StoredSessions::Versioned { version, .. } => Err(Error::serialization(
            format!("unsupported sessions layout version {version}"),
            None,
        )),
        StoredSessions::Legacy(sessions) => Ok(sessions),
    }
}

/////////////////////////////////////////// Memory ///////////////////////////////////////////

/// A process-local store, mostly useful for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

///////////////////////////////////////// Directory //////////////////////////////////////////

/// A store that keeps each key in its own file under a directory.
///
/// Writes go to a temporary sibling that is synced and renamed over the
/// target, so a crash never leaves a half-written entry behind.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| {
            Error::io(
                format!("failed to create storage directory {}", root.display()),
                err,
            )
        })?;
        Ok(Self { root })
    }

    /// The directory holding the entries.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::validation(
                format!("invalid storage key {key:?}"),
                Some("key".to_string()),
            ));
        }
        Ok(self.root.join(key))
    }
}

impl PersistentStore for DirStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::io(format!("failed to read {}", path.display()), err)),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("tmp");
        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|err| {
            let _ = fs::remove_file(&tmp);
            Error::io(format!("failed to write {}", path.display()), err)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::io(format!("failed to remove {}", path.display()), err)),
        }
    }
}
