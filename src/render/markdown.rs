//! Markdown to sanitized HTML.
//!
//! Message content is untrusted model output that may contain raw HTML.
//! It is parsed with pulldown-cmark, code is restyled, and the resulting
//! HTML always passes through ammonia before anyone sees it.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};

/// Renders markdown content into safe HTML fragments.
pub struct MarkdownRenderer {
    options: Options,
    sanitizer: ammonia::Builder<'static>,
}

impl MarkdownRenderer {
    /// Create a renderer with tables, strikethrough and task lists enabled.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);

        let mut sanitizer = ammonia::Builder::default();
        sanitizer
            .add_tag_attributes("pre", &["class", "data-language"])
            .add_tag_attributes("code", &["class"]);

        Self { options, sanitizer }
    }

    /// Render `source` to a sanitized HTML fragment.
    pub fn render(&self, source: &str) -> String {
        let events = style_code(Parser::new_ext(source, self.options));
        let mut unsafe_html = String::with_capacity(source.len() + source.len() / 2);
        html::push_html(&mut unsafe_html, events.into_iter());
        self.sanitizer.clean(&unsafe_html).to_string()
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// The language of a fenced code block, restricted to word characters.
pub fn code_language(kind: &CodeBlockKind<'_>) -> Option<String> {
    let CodeBlockKind::Fenced(info) = kind else {
        return None;
    };
    let first = info.split_whitespace().next()?;
    let lang: String = first
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if lang.is_empty() { None } else { Some(lang) }
}

/// Give block and inline code their own markup.
///
/// Fenced blocks with a language keep it as a `language-*` class and a
/// `data-language` attribute; inline spans get `inline-code`. Text inside
/// code stays a `Text` event so the HTML writer still escapes it.
fn style_code<'a>(parser: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut events = Vec::new();
    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let open = match code_language(&kind) {
                    Some(lang) => format!(
                        "<pre class=\"code-block language-{lang}\" data-language=\"{lang}\"><code class=\"language-{lang}\">"
                    ),
                    None => "<pre class=\"code-block\"><code>".to_string(),
                };
                events.push(Event::Html(open.into()));
            }
            Event::End(TagEnd::CodeBlock) => {
                events.push(Event::Html("</code></pre>\n".into()));
            }
            Event::Code(text) => {
                events.push(Event::InlineHtml("<code class=\"inline-code\">".into()));
                events.push(Event::Text(text));
                events.push(Event::InlineHtml("</code>".into()));
            }
            other => events.push(other),
        }
    }
    events
}
