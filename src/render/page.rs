use crate::render::{ENTRANCE, RenderedMessage};

const STYLE: &str = r#"
body { margin: 0; background: #f9fafb; font-family: system-ui, sans-serif; }
main { max-width: 48rem; margin: 0 auto; padding: 1.5rem; display: flex; flex-direction: column; gap: 1.5rem; }
h1 { font-size: 1.25rem; color: #1f2937; }
.message { max-width: 36rem; border-radius: 0.5rem; padding: 1rem; box-shadow: 0 1px 2px rgba(0,0,0,0.05); }
.message-user { align-self: flex-end; background: #2563eb; color: #fff; }
.message-assistant { align-self: flex-start; background: #f3f4f6; color: #1f2937; }
.message.entering { animation: message-enter var(--enter-duration) ease-out; }
pre.code-block { background: #1f2937; color: #fff; padding: 0.5rem; border-radius: 0.25rem; overflow-x: auto; }
code.inline-code { background: #e5e7eb; color: #1f2937; padding: 0 0.25rem; border-radius: 0.25rem; }
"#;

/// Render a complete, standalone HTML document for a session.
///
/// Messages carrying an entrance get the `entering` class so the browser
/// plays the fade-and-slide once when the page opens.
pub fn render_page(title: &str, messages: &[RenderedMessage]) -> String {
    let title = ammonia::clean_text(title);
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}:root {{ --enter-duration: {}ms; }}\n@keyframes message-enter {{ from {{ opacity: 0; transform: translateY({}px); }} to {{ opacity: 1; transform: translateY(0); }} }}\n</style>\n</head>\n<body>\n<main>\n<h1>{title}</h1>\n",
        ENTRANCE.duration.as_millis(),
        ENTRANCE.offset_px,
    );
    for message in messages {
        if message.entrance.is_some() {
            let animated = message
                .html
                .replacen("class=\"message ", "class=\"message entering ", 1);
            page.push_str(&animated);
        } else {
            page.push_str(&message.html);
        }
        page.push('\n');
    }
    page.push_str("</main>\n</body>\n</html>\n");
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MessageView, RenderPipeline};
    use crate::types::Message;

    #[test]
    fn page_wraps_messages_and_escapes_title() {
        let messages = vec![Message::user("hi"), Message::assistant("hello")];
        let views: Vec<_> = messages.iter().map(MessageView::settled).collect();
        let rendered = RenderPipeline::new().render(&views);
        let page = render_page("<Fractions & more>", &rendered);
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("&lt;Fractions"));
        assert!(page.contains("&amp;"));
        assert!(!page.contains("<Fractions"));
        assert!(page.contains("message entering message-user"));
        assert!(page.contains("translateY(20px)"));
        assert!(page.contains("--enter-duration: 300ms"));
    }

    #[test]
    fn settled_messages_do_not_animate() {
        let messages = vec![Message::user("hi")];
        let views: Vec<_> = messages.iter().map(MessageView::settled).collect();
        let mut pipeline = RenderPipeline::new();
        pipeline.render(&views);
        let rendered = pipeline.render(&views);
        let page = render_page("t", &rendered);
        assert!(!page.contains("message entering"));
    }
}
