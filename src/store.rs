//! In-memory session collection backed by a [`PersistentStore`].
//!
//! The [`SessionStore`] owns every mutation of the collection and of the
//! active-session pointer. Each mutation is followed by a best-effort
//! write-through to the persistent store: a failed write is logged and
//! counted, but the in-memory state is kept as is.
//!
//! A stored collection that cannot be decoded (a newer layout version, or
//! garbage) is copied to [`UNREADABLE_SESSIONS_KEY`] before the store
//! starts empty. If that copy fails the collection key is never written
//! until a later load succeeds.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::observability::{
    STORE_LOAD_REPAIRS, STORE_PERSIST_ERRORS, STORE_PERSISTS, STORE_SESSIONS_CREATED,
};
use crate::storage::{
    ACTIVE_SESSION_KEY, PersistentStore, SESSIONS_KEY, UNREADABLE_SESSIONS_KEY, decode_sessions,
    encode_sessions,
};
use crate::types::{ChatSession, Message, SessionId};

/// The collection of chat sessions plus the active-session pointer.
pub struct SessionStore<S: PersistentStore> {
    backend: S,
    sessions: Vec<ChatSession>,
    active: Option<SessionId>,
    write_protected: bool,
}

impl<S: PersistentStore> SessionStore<S> {
    /// Create an empty store. Call [`SessionStore::load`] to pick up what
    /// the backend already holds.
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            sessions: Vec::new(),
            active: None,
            write_protected: false,
        }
    }

    /// Create a store and immediately load it from `backend`.
    pub fn open(backend: S) -> Self {
        let mut store = Self::new(backend);
        store.load();
        store
    }

    /// Replace the in-memory state with what the backend holds.
    ///
    /// Unreadable data is logged and treated as absent. After loading, ids
    /// are unique and the active pointer names an existing session or is
    /// unset.
    pub fn load(&mut self) {
        self.write_protected = false;
        let sessions = match self.backend.load(SESSIONS_KEY) {
            Ok(Some(raw)) => match decode_sessions(&raw) {
                Ok(sessions) => sessions,
                Err(err) => {
                    STORE_LOAD_REPAIRS.click();
                    self.set_aside(&raw, &err);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read session collection");
                self.write_protected = true;
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let before = sessions.len();
        self.sessions = sessions
            .into_iter()
            .filter(|session| seen.insert(session.id.clone()))
            .collect();
        if self.sessions.len() != before {
            tracing::warn!(
                dropped = before - self.sessions.len(),
                "dropped sessions with duplicate ids"
            );
            STORE_LOAD_REPAIRS.click();
        }

        self.active = match self.backend.load(ACTIVE_SESSION_KEY) {
            Ok(Some(raw)) => {
                let id = SessionId::from(raw.trim());
                if self.contains(&id) {
                    Some(id)
                } else {
                    tracing::warn!(%id, "stored active session does not exist; clearing it");
                    STORE_LOAD_REPAIRS.click();
                    None
                }
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read active session id");
                None
            }
        };

        tracing::debug!(
            sessions = self.sessions.len(),
            active = ?self.active,
            "loaded session store"
        );
    }

    fn set_aside(&mut self, raw: &str, err: &Error) {
        match self.backend.save(UNREADABLE_SESSIONS_KEY, raw) {
            Ok(()) => {
                tracing::warn!(
                    error = %err,
                    key = UNREADABLE_SESSIONS_KEY,
                    "moved unreadable session collection aside"
                );
            }
            Err(save_err) => {
                tracing::error!(
                    error = %err,
                    save_error = %save_err,
                    "cannot preserve unreadable session collection; not overwriting it"
                );
                self.write_protected = true;
            }
        }
    }

    /// Returns true if the stored collection could not be read or preserved
    /// and will not be overwritten.
    pub fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    /// Write the collection and the active pointer to the backend.
    ///
    /// Fails without writing anything while the store is write protected.
    pub fn persist(&self) -> Result<()> {
        if self.write_protected {
            return Err(Error::serialization(
                "stored session collection is unreadable; refusing to overwrite it",
                None,
            ));
        }
        let encoded = encode_sessions(&self.sessions)?;
        self.backend.save(SESSIONS_KEY, &encoded)?;
        match &self.active {
            Some(id) => self.backend.save(ACTIVE_SESSION_KEY, id.as_str())?,
            None => self.backend.remove(ACTIVE_SESSION_KEY)?,
        }
        STORE_PERSISTS.click();
        Ok(())
    }

    fn persist_best_effort(&self) {
        if let Err(err) = self.persist() {
            STORE_PERSIST_ERRORS.click();
            tracing::warn!(error = %err, "failed to persist sessions; keeping in-memory state");
        }
    }

    /// Append a new empty session, make it active, and return its id.
    pub fn create_session(&mut self) -> SessionId {
        let id = SessionId::generate(self.sessions.iter().map(|s| &s.id));
        let title = ChatSession::default_title(self.sessions.len() + 1);
        tracing::debug!(%id, %title, "creating session");
        self.sessions.push(ChatSession::new(id.clone(), title));
        self.active = Some(id.clone());
        STORE_SESSIONS_CREATED.click();
        self.persist_best_effort();
        id
    }

    /// Make `id` the active session. Unknown ids are ignored.
    pub fn set_active(&mut self, id: &SessionId) {
        if !self.contains(id) {
            tracing::debug!(%id, "ignoring activation of unknown session");
            return;
        }
        self.active = Some(id.clone());
        self.persist_best_effort();
    }

    /// Append `message` to the end of session `id`.
    pub fn append_message(&mut self, id: &SessionId, message: Message) -> Result<()> {
        let session = self
            .session_mut(id)
            .ok_or_else(|| Error::session_not_found(id.clone()))?;
        session.messages.push(message);
        self.persist_best_effort();
        Ok(())
    }

    /// Retitle session `id`.
    ///
    /// Surrounding whitespace is trimmed. A title that is empty after
    /// trimming is rejected and the old title stays. Duplicate titles are
    /// allowed.
    pub fn rename_session(&mut self, id: &SessionId, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::validation(
                "session title must not be empty",
                Some("title".to_string()),
            ));
        }
        let session = self
            .session_mut(id)
            .ok_or_else(|| Error::session_not_found(id.clone()))?;
        session.title = title.to_string();
        self.persist_best_effort();
        Ok(())
    }

    /// All sessions in creation order.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// The session with id `id`.
    pub fn session(&self, id: &SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    fn session_mut(&mut self, id: &SessionId) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    /// Returns true if a session with id `id` exists.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.session(id).is_some()
    }

    /// The id of the active session.
    pub fn active_id(&self) -> Option<&SessionId> {
        self.active.as_ref()
    }

    /// The active session.
    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active.as_ref().and_then(|id| self.session(id))
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// The persistent store behind this session store.
    pub fn backend(&self) -> &S {
        &self.backend
    }
}
