use super::fence::CodeBlock;
use super::inline::Inline;
use super::reminder::Reminder;

pub const CURSOR: &str = "<span class=\"cursor\"></span>";

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

pub fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

pub fn inlines(out: &mut String, spans: &[Inline]) {
    for span in spans {
        match span {
            Inline::Text(text) => escape_into(out, text),
            Inline::Code(code) => {
                out.push_str("<code>");
                escape_into(out, code);
                out.push_str("</code>");
            }
            Inline::Strong(inner) => {
                out.push_str("<strong>");
                inlines(out, inner);
                out.push_str("</strong>");
            }
            Inline::Emphasis(inner) => {
                out.push_str("<em>");
                inlines(out, inner);
                out.push_str("</em>");
            }
            Inline::LineBreak => out.push_str("<br>"),
        }
    }
}

/// `copy_index` is the position among complete blocks; in-progress blocks have none.
pub fn code_block(out: &mut String, block: &CodeBlock, copy_index: Option<usize>) {
    let label = escape(block.label());
    if block.is_complete() {
        out.push_str("<div class=\"code-block\">");
    } else {
        out.push_str("<div class=\"code-block streaming\">");
    }
    out.push_str("<div class=\"code-header\"><span class=\"code-lang\">");
    out.push_str(&label);
    out.push_str("</span>");
    match copy_index {
        Some(index) if block.is_complete() => {
            out.push_str(&format!("<button class=\"copy-btn\" data-copy-index=\"{}\">Copy</button>", index));
        }
        _ => out.push_str("<span class=\"code-streaming\">streaming\u{2026}</span>"),
    }
    out.push_str("</div><pre><code class=\"language-");
    out.push_str(&label);
    out.push_str("\">");
    escape_into(out, &block.code);
    out.push_str("</code></pre></div>");
}

pub fn reminder_badge(out: &mut String, reminder: &Reminder) {
    out.push_str("<div class=\"reminder-badge\"><span class=\"reminder-when\">");
    escape_into(out, &reminder.when);
    out.push_str("</span><span class=\"reminder-what\">");
    escape_into(out, &reminder.what);
    out.push_str("</span></div>");
}
