//! The view controller: user intents in, store mutations and completions out.
//!
//! Every submission moves through `Idle → Sending → Idle`. While a request
//! is in flight the input is disabled and further submissions are ignored.
//! Whatever the completion returns, success or failure, ends up as an
//! assistant entry in the session that was active when the user hit send.

use std::fmt;

use crate::client::{Completion, error_message};
use crate::error::{Error, Result};
use crate::render::MessageView;
use crate::storage::PersistentStore;
use crate::store::SessionStore;
use crate::types::{ChatSession, Message, SessionId};

/// Where the controller is in the request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Ready for input.
    Idle,
    /// Waiting on the completion for `session`.
    Sending {
        /// The session the reply will be appended to.
        session: SessionId,
    },
}

/// Why a submission was dropped without doing anything.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A request is already in flight.
    Busy,
    /// The input was empty or whitespace.
    EmptyInput,
    /// No session is active.
    NoActiveSession,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::Busy => write!(f, "a reply is still on its way"),
            IgnoreReason::EmptyInput => write!(f, "nothing to send"),
            IgnoreReason::NoActiveSession => write!(f, "no active session"),
        }
    }
}

/// How a submission ended.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Nothing was sent.
    Ignored(IgnoreReason),
    /// The reply was appended.
    Succeeded,
    /// An error entry was appended in place of the reply.
    Failed(Error),
}

impl SubmitOutcome {
    /// Returns true if the submission was dropped.
    pub fn is_ignored(&self) -> bool {
        matches!(self, SubmitOutcome::Ignored(_))
    }
}

/// A submission waiting for its completion.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// The session the reply belongs to.
    pub session: SessionId,
    /// The history to complete, ending with the user's message.
    pub history: Vec<Message>,
}

/// Wires input to the session store and the completion client.
pub struct ViewController<S: PersistentStore, C: Completion> {
    store: SessionStore<S>,
    completion: C,
    state: RequestState,
    fresh: Option<(SessionId, usize)>,
}

impl<S: PersistentStore, C: Completion> ViewController<S, C> {
    /// Create a controller over an already-loaded store.
    pub fn new(store: SessionStore<S>, completion: C) -> Self {
        Self {
            store,
            completion,
            state: RequestState::Idle,
            fresh: None,
        }
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    /// The completion backend.
    pub fn completion(&self) -> &C {
        &self.completion
    }

    /// The current request state.
    pub fn state(&self) -> &RequestState {
        &self.state
    }

    /// Returns true while a reply is on its way.
    pub fn is_loading(&self) -> bool {
        matches!(self.state, RequestState::Sending { .. })
    }

    /// Returns true when the input box should accept text.
    pub fn input_enabled(&self) -> bool {
        !self.is_loading() && self.store.active_id().is_some()
    }

    /// The active session.
    pub fn active_session(&self) -> Option<&ChatSession> {
        self.store.active_session()
    }

    /// Start a new session and make it active.
    pub fn new_session(&mut self) -> SessionId {
        self.fresh = None;
        self.store.create_session()
    }

    /// Make `id` the active session; unknown ids are ignored.
    pub fn select_session(&mut self, id: &SessionId) {
        if self.store.active_id() != Some(id) {
            self.fresh = None;
        }
        self.store.set_active(id);
    }

    /// Retitle session `id`.
    pub fn rename_session(&mut self, id: &SessionId, title: &str) -> Result<()> {
        self.store.rename_session(id, title)
    }

    /// The active session's messages, with the freshest reply flagged new.
    pub fn messages(&self) -> Vec<MessageView<'_>> {
        let Some(session) = self.store.active_session() else {
            return Vec::new();
        };
        session
            .messages
            .iter()
            .enumerate()
            .map(|(index, message)| MessageView {
                message,
                is_new: self
                    .fresh
                    .as_ref()
                    .is_some_and(|(id, at)| id == &session.id && *at == index),
            })
            .collect()
    }

    /// Validate `input`, append it, and enter `Sending`.
    pub fn begin_submit(&mut self, input: &str) -> std::result::Result<PendingRequest, IgnoreReason> {
        if self.is_loading() {
            return Err(IgnoreReason::Busy);
        }
        if input.trim().is_empty() {
            return Err(IgnoreReason::EmptyInput);
        }
        let Some(session) = self.store.active_id().cloned() else {
            return Err(IgnoreReason::NoActiveSession);
        };
        if let Err(err) = self.store.append_message(&session, Message::user(input)) {
            tracing::warn!(error = %err, "active session vanished before submit");
            return Err(IgnoreReason::NoActiveSession);
        }
        let history = self
            .store
            .session(&session)
            .map(|s| s.messages.clone())
            .unwrap_or_default();
        self.state = RequestState::Sending {
            session: session.clone(),
        };
        Ok(PendingRequest { session, history })
    }

    /// Append the completion result for `pending` and return to `Idle`.
    pub fn finish_submit(&mut self, pending: PendingRequest, result: Result<Message>) -> SubmitOutcome {
        let (message, outcome) = match result {
            Ok(message) => (message, SubmitOutcome::Succeeded),
            Err(err) => {
                tracing::info!(session = %pending.session, error = %err, "surfacing completion failure in the conversation");
                (error_message(&err), SubmitOutcome::Failed(err))
            }
        };
        match self.store.append_message(&pending.session, message) {
            Ok(()) => {
                let index = self
                    .store
                    .session(&pending.session)
                    .map(|s| s.messages.len().saturating_sub(1))
                    .unwrap_or_default();
                self.fresh = Some((pending.session.clone(), index));
            }
            Err(err) => {
                tracing::warn!(error = %err, "dropping reply for a session that no longer exists");
            }
        }
        self.state = RequestState::Idle;
        outcome
    }

    /// Send `input` to the active session and wait for the reply.
    pub async fn submit(&mut self, input: &str) -> SubmitOutcome {
        let pending = match self.begin_submit(input) {
            Ok(pending) => pending,
            Err(reason) => {
                tracing::debug!(%reason, "ignoring submit");
                return SubmitOutcome::Ignored(reason);
            }
        };
        let result = self.completion.complete(&pending.history).await;
        self.finish_submit(pending, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ERROR_MARKER, is_error_message};
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies with a canned result and remembers what it was asked.
    struct Canned {
        reply: Result<Message>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl Canned {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(Message::assistant(text)),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn err(err: Error) -> Self {
            Self {
                reply: Err(err),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completion for Canned {
        async fn complete(&self, history: &[Message]) -> Result<Message> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.reply.clone()
        }
    }

    fn controller(completion: Canned) -> ViewController<MemoryStore, Canned> {
        ViewController::new(SessionStore::new(MemoryStore::new()), completion)
    }

    #[tokio::test]
    async fn submit_appends_user_and_reply() {
        let mut ctl = controller(Canned::ok("hello"));
        ctl.new_session();
        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded));
        assert_eq!(
            ctl.active_session().unwrap().messages,
            vec![Message::user("hi"), Message::assistant("hello")]
        );
        assert_eq!(ctl.state(), &RequestState::Idle);
        assert_eq!(
            ctl.completion().seen.lock().unwrap().as_slice(),
            &[vec![Message::user("hi")]]
        );
    }

    #[tokio::test]
    async fn failed_completion_becomes_error_entry() {
        let mut ctl = controller(Canned::err(Error::transport(
            "completion endpoint returned 500: server error",
            Some(500),
            None,
        )));
        ctl.new_session();
        let outcome = ctl.submit("hi").await;
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        let messages = &ctl.active_session().unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("hi"));
        assert!(messages[1].is_assistant());
        assert!(messages[1].content.starts_with(ERROR_MARKER));
        assert!(is_error_message(&messages[1]));
        assert!(!ctl.is_loading());
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut ctl = controller(Canned::ok("hello"));
        ctl.new_session();
        for input in ["", "   ", "\n\t"] {
            let outcome = ctl.submit(input).await;
            assert!(matches!(
                outcome,
                SubmitOutcome::Ignored(IgnoreReason::EmptyInput)
            ));
        }
        assert!(ctl.active_session().unwrap().is_empty());
        assert!(ctl.completion().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_without_session_is_ignored() {
        let mut ctl = controller(Canned::ok("hello"));
        assert!(!ctl.input_enabled());
        let outcome = ctl.submit("hi").await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Ignored(IgnoreReason::NoActiveSession)
        ));
        assert!(ctl.store().is_empty());
    }

    #[test]
    fn submit_while_sending_is_ignored() {
        let mut ctl = controller(Canned::ok("hello"));
        let id = ctl.new_session();
        let pending = ctl.begin_submit("first").unwrap();
        assert!(ctl.is_loading());
        assert!(!ctl.input_enabled());
        assert_eq!(ctl.begin_submit("second").unwrap_err(), IgnoreReason::Busy);

        ctl.finish_submit(pending, Ok(Message::assistant("reply")));
        assert!(ctl.input_enabled());
        let messages = &ctl.store().session(&id).unwrap().messages;
        assert_eq!(
            messages,
            &vec![Message::user("first"), Message::assistant("reply")]
        );
    }

    #[test]
    fn reply_lands_in_the_session_it_was_sent_from() {
        let mut ctl = controller(Canned::ok("unused"));
        let first = ctl.new_session();
        let pending = ctl.begin_submit("question").unwrap();
        let second = ctl.new_session();
        ctl.finish_submit(pending, Ok(Message::assistant("answer")));

        assert_eq!(ctl.store().session(&first).unwrap().messages.len(), 2);
        assert!(ctl.store().session(&second).unwrap().is_empty());
        assert_eq!(ctl.store().active_id(), Some(&second));
    }

    #[tokio::test]
    async fn newest_reply_is_flagged_new() {
        let mut ctl = controller(Canned::ok("hello"));
        let id = ctl.new_session();
        ctl.submit("hi").await;
        ctl.submit("again").await;
        let flags: Vec<_> = ctl.messages().iter().map(|v| v.is_new).collect();
        assert_eq!(flags, [false, false, false, true]);

        let other = ctl.new_session();
        assert!(ctl.messages().is_empty());
        ctl.select_session(&id);
        assert!(ctl.messages().iter().all(|v| !v.is_new));
        ctl.select_session(&other);
    }

    #[tokio::test]
    async fn submit_keeps_input_verbatim() {
        let mut ctl = controller(Canned::ok("ok"));
        ctl.new_session();
        ctl.submit("  spaced out  ").await;
        assert_eq!(
            ctl.active_session().unwrap().messages[0],
            Message::user("  spaced out  ")
        );
    }

    #[test]
    fn rename_goes_through_the_store() {
        let mut ctl = controller(Canned::ok("ok"));
        let id = ctl.new_session();
        ctl.rename_session(&id, "Decimals").unwrap();
        assert_eq!(ctl.active_session().unwrap().title, "Decimals");
        assert!(ctl.rename_session(&id, " ").is_err());
    }
}
