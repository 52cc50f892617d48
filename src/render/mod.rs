//! Rendering of a session's messages to HTML.
//!
//! The [`RenderPipeline`] keeps one [`MessageComponent`] per rendered
//! message, matched up by position in the list. A component mounted for
//! the first time plays the entrance animation once. A component whose
//! message is flagged new and was written by the assistant reveals its
//! content one character at a time; every other message shows in full at
//! once. Whether a message is new is always the caller's call, never
//! inferred from the content.

mod markdown;
mod page;
mod reveal;

use std::time::Duration;

pub use markdown::{MarkdownRenderer, code_language};
pub use page::render_page;
pub use reveal::{DEFAULT_REVEAL_DELAY, Reveal, RevealFrame};

use crate::types::{Message, MessageRole, SessionId};

/// The entrance animation played when a message first appears.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Entrance {
    /// How long the fade and slide last.
    pub duration: Duration,
    /// How far below its resting place the message starts, in pixels.
    pub offset_px: u32,
}

/// Fade in while sliding up 20px over 300ms.
pub const ENTRANCE: Entrance = Entrance {
    duration: Duration::from_millis(300),
    offset_px: 20,
};

/// A message handed to the pipeline.
#[derive(Debug, Copy, Clone)]
pub struct MessageView<'a> {
    /// The message to render.
    pub message: &'a Message,
    /// True only for the message that was just appended.
    pub is_new: bool,
}

impl<'a> MessageView<'a> {
    /// A message that was already on screen.
    pub fn settled(message: &'a Message) -> Self {
        Self {
            message,
            is_new: false,
        }
    }

    /// The message that was just appended.
    pub fn fresh(message: &'a Message) -> Self {
        Self {
            message,
            is_new: true,
        }
    }
}

/// One rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Position in the session.
    pub index: usize,
    /// Author of the message.
    pub role: MessageRole,
    /// Sanitized HTML, wrapped in a role-specific container.
    pub html: String,
    /// The text shown so far, before markdown rendering.
    pub displayed: String,
    /// True while the content is still being revealed.
    pub revealing: bool,
    /// Present on the first frame after the message was mounted.
    pub entrance: Option<Entrance>,
}

/// CSS class of the container for `role`.
pub fn role_class(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "message message-user",
        MessageRole::Assistant => "message message-assistant",
    }
}

/// The rendering state of one message.
#[derive(Debug)]
pub struct MessageComponent {
    role: MessageRole,
    content: String,
    animated: bool,
    reveal: Reveal,
    entrance_pending: bool,
}

impl MessageComponent {
    /// Mount a component for `view`.
    pub fn mount(view: MessageView<'_>, delay: Duration) -> Self {
        let animated = view.is_new && view.message.is_assistant();
        let mut reveal = Reveal::new(delay);
        if animated {
            reveal.start(view.message.content.as_str());
        } else {
            reveal.show(view.message.content.as_str());
        }
        Self {
            role: view.message.role,
            content: view.message.content.clone(),
            animated,
            reveal,
            entrance_pending: true,
        }
    }

    /// Feed a possibly different message into this component.
    ///
    /// Changed content cancels whatever reveal is running, then either
    /// restarts the reveal from empty (new assistant content) or shows the
    /// content in full.
    pub fn update(&mut self, view: MessageView<'_>) {
        self.role = view.message.role;
        let animated = view.is_new && view.message.is_assistant();
        if view.message.content == self.content && animated == self.animated {
            return;
        }
        self.animated = animated;
        self.content = view.message.content.clone();
        if animated {
            self.reveal.start(self.content.as_str());
        } else {
            self.reveal.show(self.content.as_str());
        }
    }

    /// Author of the message.
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// The full content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The text shown so far.
    pub fn displayed(&self) -> String {
        self.reveal.text()
    }

    /// Returns true while characters are still being revealed.
    pub fn is_revealing(&self) -> bool {
        self.reveal.is_running()
    }

    /// The reveal driving this component.
    pub fn reveal(&self) -> &Reveal {
        &self.reveal
    }

    /// Stop revealing and show everything.
    pub fn skip_reveal(&mut self) {
        self.reveal.finish();
    }

    /// The entrance animation, handed out exactly once.
    pub fn take_entrance(&mut self) -> Option<Entrance> {
        if std::mem::take(&mut self.entrance_pending) {
            Some(ENTRANCE)
        } else {
            None
        }
    }
}

/// Turns message lists into rendered frames.
pub struct RenderPipeline {
    markdown: MarkdownRenderer,
    delay: Duration,
    components: Vec<MessageComponent>,
    session: Option<SessionId>,
}

impl RenderPipeline {
    /// Create a pipeline with the default reveal delay.
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_REVEAL_DELAY)
    }

    /// Create a pipeline revealing one character per `delay`.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            markdown: MarkdownRenderer::new(),
            delay,
            components: Vec::new(),
            session: None,
        }
    }

    /// Render for `session` from now on.
    ///
    /// Switching to a different session unmounts every component, so its
    /// messages mount fresh instead of being matched up by position with
    /// the previous session's.
    pub fn bind_session(&mut self, session: Option<&SessionId>) {
        if self.session.as_ref() != session {
            self.components.clear();
            self.session = session.cloned();
        }
    }

    /// The session the components belong to.
    pub fn session(&self) -> Option<&SessionId> {
        self.session.as_ref()
    }

    /// The reveal delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Reconcile components with `views` and render the current frame.
    pub fn render(&mut self, views: &[MessageView<'_>]) -> Vec<RenderedMessage> {
        self.sync(views);
        self.frame()
    }

    /// Reconcile components with `views` without rendering.
    pub fn sync(&mut self, views: &[MessageView<'_>]) {
        self.components.truncate(views.len());
        for (index, view) in views.iter().enumerate() {
            match self.components.get_mut(index) {
                Some(component) => component.update(*view),
                None => self
                    .components
                    .push(MessageComponent::mount(*view, self.delay)),
            }
        }
    }

    /// Render what every component shows right now.
    pub fn frame(&mut self) -> Vec<RenderedMessage> {
        let markdown = &self.markdown;
        self.components
            .iter_mut()
            .enumerate()
            .map(|(index, component)| {
                let displayed = component.displayed();
                let body = markdown.render(&displayed);
                RenderedMessage {
                    index,
                    role: component.role(),
                    html: format!(
                        "<div class=\"{}\" data-index=\"{index}\">{body}</div>",
                        role_class(component.role())
                    ),
                    displayed,
                    revealing: component.is_revealing(),
                    entrance: component.take_entrance(),
                }
            })
            .collect()
    }

    /// Render a single piece of markdown without any component state.
    pub fn render_markdown(&self, source: &str) -> String {
        self.markdown.render(source)
    }

    /// Returns true while any message is still being revealed.
    pub fn is_animating(&self) -> bool {
        self.components.iter().any(MessageComponent::is_revealing)
    }

    /// Show every message in full.
    pub fn skip_reveals(&mut self) {
        for component in &mut self.components {
            component.skip_reveal();
        }
    }

    /// The mounted components, in message order.
    pub fn components(&self) -> &[MessageComponent] {
        &self.components
    }

    /// Unmount everything.
    pub fn clear(&mut self) {
        self.components.clear();
        self.session = None;
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new()
    }
}
