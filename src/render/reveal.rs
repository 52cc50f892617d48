//! Character-by-character reveal of newly arrived replies.
//!
//! A [`Reveal`] owns at most one timer task. Starting a reveal always
//! aborts the previous task first and bumps a generation counter; a task
//! only writes while its generation is current, so a reveal that was
//! cancelled can never add characters to the one that replaced it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::observability::{REVEAL_CANCELS, REVEAL_STARTS};

/// Time between two revealed characters.
pub const DEFAULT_REVEAL_DELAY: Duration = Duration::from_millis(20);

/// What a reveal currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevealFrame {
    /// Bumped on every start; identifies the reveal that owns the frame.
    pub generation: u64,
    /// The visible prefix of the content.
    pub text: String,
    /// Number of characters in `text`.
    pub revealed: usize,
    /// Number of characters in the full content.
    pub total: usize,
}

impl RevealFrame {
    /// Returns true once the whole content is visible.
    pub fn is_complete(&self) -> bool {
        self.revealed >= self.total
    }
}

/// A restartable, cancelable typing effect for one piece of content.
#[derive(Debug)]
pub struct Reveal {
    delay: Duration,
    content: String,
    generation: u64,
    frames: Arc<watch::Sender<RevealFrame>>,
    task: Option<JoinHandle<()>>,
}

impl Reveal {
    /// Create an idle reveal showing nothing.
    pub fn new(delay: Duration) -> Self {
        let (frames, _) = watch::channel(RevealFrame::default());
        Self {
            delay,
            content: String::new(),
            generation: 0,
            frames: Arc::new(frames),
            task: None,
        }
    }

    /// The interval between characters.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The full content being revealed.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reset to empty and reveal `content` from the start.
    ///
    /// Without a tokio runtime, or with a zero delay, the content is shown
    /// at once.
    pub fn start(&mut self, content: impl Into<String>) {
        self.cancel();
        self.reset(content.into(), false);

        let total = self.content.chars().count();
        if total == 0 {
            return;
        }
        if self.delay.is_zero() {
            self.show_all();
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no runtime for reveal; showing content at once");
            self.show_all();
            return;
        };

        REVEAL_STARTS.click();
        let generation = self.generation;
        let frames = Arc::clone(&self.frames);
        let chars: Vec<char> = self.content.chars().collect();
        let delay = self.delay;
        self.task = Some(handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + delay, delay);
            for ch in chars {
                ticker.tick().await;
                let current = frames.send_if_modified(|frame| {
                    if frame.generation != generation {
                        return false;
                    }
                    frame.text.push(ch);
                    frame.revealed += 1;
                    true
                });
                if !current {
                    return;
                }
            }
        }));
    }

    /// Show `content` in full right away, cancelling any running reveal.
    pub fn show(&mut self, content: impl Into<String>) {
        self.cancel();
        self.reset(content.into(), true);
    }

    /// Stop the running reveal and show the full content.
    pub fn finish(&mut self) {
        self.cancel();
        self.show_all();
    }

    /// Stop the running reveal, leaving the visible prefix as is.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take()
            && !task.is_finished()
        {
            task.abort();
            REVEAL_CANCELS.click();
        }
    }

    fn reset(&mut self, content: String, complete: bool) {
        self.generation += 1;
        let total = content.chars().count();
        let frame = RevealFrame {
            generation: self.generation,
            text: if complete { content.clone() } else { String::new() },
            revealed: if complete { total } else { 0 },
            total,
        };
        self.content = content;
        self.frames.send_replace(frame);
    }

    fn show_all(&mut self) {
        let content = self.content.clone();
        self.frames.send_modify(|frame| {
            frame.revealed = frame.total;
            frame.text = content;
        });
    }

    /// The currently visible prefix.
    pub fn text(&self) -> String {
        self.frames.borrow().text.clone()
    }

    /// A copy of the current frame.
    pub fn frame(&self) -> RevealFrame {
        self.frames.borrow().clone()
    }

    /// Number of characters currently visible.
    pub fn revealed(&self) -> usize {
        self.frames.borrow().revealed
    }

    /// Returns true once the whole content is visible.
    pub fn is_complete(&self) -> bool {
        self.frames.borrow().is_complete()
    }

    /// Returns true while characters are still being added.
    pub fn is_running(&self) -> bool {
        !self.is_complete() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Watch frames as they change.
    pub fn subscribe(&self) -> watch::Receiver<RevealFrame> {
        self.frames.subscribe()
    }
}

impl Drop for Reveal {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
