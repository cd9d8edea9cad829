//! Markup rendering for a reply that may still be streaming.
//!
//! [`parse`] is a pure function of the full text, so the caller re-renders
//! from scratch after every fragment: a single new token can close a fence
//! and reclassify everything before it. Stages run in a fixed order:
//! reminder tags are pulled out, fenced code is split off (at most one block,
//! always the last, may still be open), and the remaining prose is scanned
//! into typed blocks. HTML is only produced from those blocks, with every
//! text span escaped.

pub mod blocks;
pub mod fence;
pub mod html;
pub mod inline;
pub mod reminder;

pub use blocks::ListKind;
pub use fence::{ CodeBlock, FenceState };
pub use inline::Inline;
pub use reminder::Reminder;

use fence::Segment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderBlock {
    Paragraph(Vec<Inline>),
    Heading {
        level: u8,
        content: Vec<Inline>,
    },
    List {
        kind: ListKind,
        items: Vec<Vec<Inline>>,
    },
    Code(CodeBlock),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Mark the active writing position. Set while the reply is streaming.
    pub cursor: bool,
}

impl RenderOptions {
    pub fn streaming() -> Self {
        Self { cursor: true }
    }

    pub fn finished() -> Self {
        Self { cursor: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<RenderBlock>,
    pub reminders: Vec<Reminder>,
}

pub fn parse(text: &str) -> Document {
    let (flow, reminders) = reminder::extract(text);
    let mut blocks = Vec::new();
    for segment in fence::split(&flow) {
        match segment {
            Segment::Prose(prose) => blocks::parse(prose, &mut blocks),
            Segment::Code(code) => blocks.push(RenderBlock::Code(code)),
        }
    }
    Document { blocks, reminders }
}

pub fn render(text: &str, options: RenderOptions) -> String {
    parse(text).to_html(options)
}

impl Document {
    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.blocks.iter().filter_map(|block| match block {
            RenderBlock::Code(code) => Some(code),
            _ => None,
        })
    }

    /// The block still waiting for its closing fence, if any.
    pub fn in_progress(&self) -> Option<&CodeBlock> {
        self.code_blocks().find(|code| !code.is_complete())
    }

    /// Code of the `index`-th complete block, matching the `data-copy-index`
    /// emitted for its copy button.
    pub fn copyable(&self, index: usize) -> Option<&str> {
        self.code_blocks()
            .filter(|code| code.is_complete())
            .nth(index)
            .map(|code| code.code.as_str())
    }

    pub fn to_html(&self, options: RenderOptions) -> String {
        let mut out = String::new();
        let last = self.blocks.len().checked_sub(1);
        let mut copy_index = 0;

        for (i, block) in self.blocks.iter().enumerate() {
            let cursor = options.cursor && Some(i) == last;
            match block {
                RenderBlock::Paragraph(spans) => {
                    out.push_str("<p>");
                    html::inlines(&mut out, spans);
                    push_cursor(&mut out, cursor);
                    out.push_str("</p>");
                }
                RenderBlock::Heading { level, content } => {
                    out.push_str(&format!("<h{}>", level));
                    html::inlines(&mut out, content);
                    push_cursor(&mut out, cursor);
                    out.push_str(&format!("</h{}>", level));
                }
                RenderBlock::List { kind, items } => {
                    let tag = match kind {
                        ListKind::Bullet => "ul",
                        ListKind::Numbered => "ol",
                    };
                    out.push_str(&format!("<{}>", tag));
                    for (n, item) in items.iter().enumerate() {
                        out.push_str("<li>");
                        html::inlines(&mut out, item);
                        push_cursor(&mut out, cursor && n + 1 == items.len());
                        out.push_str("</li>");
                    }
                    out.push_str(&format!("</{}>", tag));
                }
                RenderBlock::Code(code) => {
                    let index = code.is_complete().then_some(copy_index);
                    if code.is_complete() {
                        copy_index += 1;
                    }
                    html::code_block(&mut out, code, index);
                    // Never inside the code itself.
                    push_cursor(&mut out, cursor);
                }
            }
        }
        if options.cursor && last.is_none() {
            out.push_str(html::CURSOR);
        }

        for reminder in &self.reminders {
            html::reminder_badge(&mut out, reminder);
        }
        out
    }
}

fn push_cursor(out: &mut String, cursor: bool) {
    if cursor {
        out.push_str(html::CURSOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_is_wrapped_and_markup_escaped() {
        assert_eq!(render("Hello **world**", RenderOptions::finished()), "<p>Hello <strong>world</strong></p>");
        assert_eq!(render("<script>", RenderOptions::finished()), "<p>&lt;script&gt;</p>");
    }

    #[test]
    fn escaped_text_is_never_restyled() {
        let html = render("a &lt; **<b>**", RenderOptions::finished());
        assert_eq!(html, "<p>a &amp;lt; <strong>&lt;b&gt;</strong></p>");
    }

    #[test]
    fn reminder_becomes_badge_after_content() {
        let html = render("Got it. [REMIND: tomorrow | buy milk]\n\nAnything else?", RenderOptions::finished());
        assert!(!html.contains("REMIND"));
        assert!(html.ends_with(
            "<div class=\"reminder-badge\"><span class=\"reminder-when\">tomorrow</span><span class=\"reminder-what\">buy milk</span></div>"
        ));
        assert!(html.starts_with("<p>Got it. </p><p>Anything else?</p>"));
    }

    #[test]
    fn complete_block_gets_copy_button() {
        let html = render("```rust\nlet a = 1 < 2;\n```", RenderOptions::finished());
        assert_eq!(
            html,
            "<div class=\"code-block\"><div class=\"code-header\"><span class=\"code-lang\">rust</span>\
<button class=\"copy-btn\" data-copy-index=\"0\">Copy</button></div>\
<pre><code class=\"language-rust\">let a = 1 &lt; 2;</code></pre></div>"
        );
    }

    #[test]
    fn in_progress_block_shows_streaming_label() {
        let html = render("Here:\n```python\nprint(", RenderOptions::finished());
        assert!(html.contains("code-block streaming"));
        assert!(html.contains("streaming\u{2026}"));
        assert!(!html.contains("copy-btn"));
        assert!(html.contains("print("));
    }

    #[test]
    fn copy_indices_skip_the_streaming_block() {
        let doc = parse("```\na\n```\n```\nb\n```\n```\nc");
        assert_eq!(doc.copyable(0), Some("a"));
        assert_eq!(doc.copyable(1), Some("b"));
        assert_eq!(doc.copyable(2), None);
        assert_eq!(doc.in_progress().map(|c| c.code.as_str()), Some("c"));
        let html = doc.to_html(RenderOptions::finished());
        assert!(html.contains("data-copy-index=\"1\""));
        assert!(!html.contains("data-copy-index=\"2\""));
    }

    #[test]
    fn cursor_goes_into_the_last_open_element() {
        assert_eq!(render("hi", RenderOptions::streaming()), format!("<p>hi{}</p>", html::CURSOR));
        assert_eq!(render("# T", RenderOptions::streaming()), format!("<h1>T{}</h1>", html::CURSOR));
        assert_eq!(
            render("- a\n- b", RenderOptions::streaming()),
            format!("<ul><li>a</li><li>b{}</li></ul>", html::CURSOR)
        );
        assert_eq!(render("", RenderOptions::streaming()), html::CURSOR);
    }

    #[test]
    fn cursor_is_never_inside_a_code_block() {
        let html = render("```js\nlet x", RenderOptions::streaming());
        assert!(html.ends_with(&format!("</code></pre></div>{}", html::CURSOR)));
        let code_start = html.find("<pre>").unwrap();
        let code_end = html.find("</pre>").unwrap();
        assert!(!html[code_start..code_end].contains("cursor"));
    }

    #[test]
    fn cursor_precedes_reminder_badges() {
        let html = render("ok [REMIND: 5pm | tea]", RenderOptions::streaming());
        let cursor = html.find("cursor").unwrap();
        let badge = html.find("reminder-badge").unwrap();
        assert!(cursor < badge);
    }

    #[test]
    fn rendering_is_deterministic() {
        let text = "# Title\n\nSome *text* with `code`.\n\n```rs\nfn a() {}\n```\n- x\n- y\n```sh\nls";
        let first = render(text, RenderOptions::streaming());
        let second = render(text, RenderOptions::streaming());
        assert_eq!(first, second);
    }
}
