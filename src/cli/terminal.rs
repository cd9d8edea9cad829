use log::warn;
use std::borrow::Cow;
use std::io::{ self, Write };
use std::path::PathBuf;

use crate::controller::{ ChatView, ControllerError };
use crate::models::chat::{ ConversationSummary, Message, Role, ScheduledReminder };
use crate::render::{ self, html };
use crate::stream::StatsSnapshot;

pub const USER_LABEL: &str = "\x1b[96mYou:\x1b[0m ";
pub const ASSISTANT_LABEL: &str = "\x1b[93mThursday:\x1b[0m ";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[91m";
const RESET: &str = "\x1b[0m";
const CLEAR_LINE: &str = "\r\x1b[2K";

/// OSC 0 sets the terminal title, used as the status line once text is
/// flowing on the main line.
fn title(text: &str) -> String {
    format!("\x1b]0;{}\x07", text)
}

/// Remote text is printed through this so it cannot drive the terminal.
/// Control characters other than newline and tab are shown in caret
/// notation (`ESC` becomes `^[`); carriage returns are dropped.
pub fn printable(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| c.is_control() && c != '\n' && c != '\t') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\n' | '\t' => out.push(c),
            '\r' => {}
            '\u{7f}' => out.push_str("^?"),
            c if (c as u32) < 0x20 => {
                out.push('^');
                out.push(char::from(c as u8 + 0x40));
            }
            c if c.is_control() => out.push_str(&format!("<U+{:04X}>", c as u32)),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Prints a streaming reply as it arrives and, when configured, mirrors the
/// rendered HTML into a preview file.
pub struct TerminalView<W: Write = io::Stdout> {
    out: W,
    render_out: Option<PathBuf>,
    /// No fragment has been printed for the current reply yet.
    waiting: bool,
}

impl TerminalView<io::Stdout> {
    pub fn stdout(render_out: Option<PathBuf>) -> Self {
        Self::new(io::stdout(), render_out)
    }
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, render_out: Option<PathBuf>) -> Self {
        Self { out, render_out, waiting: false }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn print(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }

    fn write_preview(&self, body_html: &str, stats: Option<&StatsSnapshot>) {
        let Some(path) = &self.render_out else {
            return;
        };
        let stats = stats.map(|s| html::escape(&s.to_string())).unwrap_or_default();
        if let Err(e) = std::fs::write(path, preview_page(body_html, &stats)) {
            warn!("Failed to write HTML preview to {}: {}", path.display(), e);
        }
    }
}

pub fn preview_page(body_html: &str, stats: &str) -> String {
    format!(
        concat!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">",
            "<meta http-equiv=\"refresh\" content=\"1\"><title>Thursday</title>",
            "<style>{}</style></head><body>",
            "<div class=\"message assistant\">{}</div>",
            "<div class=\"stats\">{}</div></body></html>\n"
        ),
        PREVIEW_CSS,
        body_html,
        stats
    )
}

const PREVIEW_CSS: &str =
    "body{font-family:sans-serif;max-width:48rem;margin:2rem auto}\
.code-block{border:1px solid #ccc;border-radius:6px;margin:1em 0}\
.code-header{display:flex;justify-content:space-between;padding:4px 8px;background:#eee}\
.code-block pre{margin:0;padding:8px;overflow-x:auto}\
.code-streaming{font-style:italic;color:#888}\
.cursor{display:inline-block;width:.5em;height:1em;background:#333}\
.reminder-badge{display:inline-block;border-radius:4px;background:#fdf3c4;padding:2px 6px;margin:4px}\
.reminder-when{font-weight:bold;margin-right:6px}\
.stats{color:#888;font-size:small}";

impl<W: Write> ChatView for TerminalView<W> {
    fn user_message(&mut self, _message: &Message) {
        self.waiting = true;
    }

    fn fragment(&mut self, fragment: &str, html: &str, stats: &StatsSnapshot) {
        if self.waiting {
            self.waiting = false;
            self.print(&format!("{}{}", CLEAR_LINE, ASSISTANT_LABEL));
        }
        self.print(&printable(fragment));
        self.write_preview(html, Some(stats));
    }

    fn tick(&mut self, stats: &StatsSnapshot) {
        if self.waiting {
            self.print(
                &format!("{}{}{}waiting {}{}", CLEAR_LINE, ASSISTANT_LABEL, DIM, stats.elapsed_label(), RESET)
            );
        } else {
            self.print(&title(&format!("Thursday · {}", stats)));
        }
    }

    fn finished(&mut self, message: &Message, html: &str, stats: &StatsSnapshot) {
        if self.waiting {
            self.waiting = false;
            self.print(&format!("{}{}", CLEAR_LINE, ASSISTANT_LABEL));
        }
        let mut tail = String::from("\n");
        if message.content.trim().is_empty() {
            tail.push_str(&format!("{}(empty reply){}\n", DIM, RESET));
        }
        for reminder in render::parse(&message.content).reminders {
            tail.push_str(
                &format!("  [reminder] {}: {}\n", printable(&reminder.when), printable(&reminder.what))
            );
        }
        tail.push_str(&format!("{}({}){}\n\n", DIM, stats, RESET));
        tail.push_str(&title("Thursday"));
        self.print(&tail);
        self.write_preview(html, Some(stats));
    }

    fn failed(&mut self, partial_html: &str, error: &ControllerError, stats: Option<&StatsSnapshot>) {
        let lead = if self.waiting { CLEAR_LINE } else { "\n" };
        self.waiting = false;
        let note = match error {
            ControllerError::Cancelled => "[!] Reply cancelled.".to_string(),
            other => format!("[!] Error: {}", printable(&other.to_string())),
        };
        self.print(&format!("{}{}{}{}\n\n{}", lead, RED, note, RESET, title("Thursday")));
        self.write_preview(partial_html, stats);
    }

    fn conversation_opened(&mut self, id: &str, messages: &[Message]) {
        let mut text = format!("[✓] Opened conversation {}\n", printable(id));
        for message in messages {
            let label = match message.role {
                Role::User => USER_LABEL,
                Role::Assistant => ASSISTANT_LABEL,
                Role::System => continue,
            };
            text.push_str(&format!("{}{}\n", label, printable(&message.content)));
        }
        text.push('\n');
        self.print(&text);
    }
}

pub fn format_conversations(conversations: &[ConversationSummary], current: Option<&str>) -> String {
    if conversations.is_empty() {
        return "No conversations yet.\n".to_string();
    }
    let mut text = String::new();
    for summary in conversations {
        let marker = if Some(summary.id.as_str()) == current { "*" } else { " " };
        let updated = summary
            .updated()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "--".to_string());
        text.push_str(
            &format!("{} {}  {}  {}\n", marker, printable(&summary.id), updated, printable(&summary.title))
        );
    }
    text
}

pub fn format_reminders(reminders: &[ScheduledReminder]) -> String {
    if reminders.is_empty() {
        return "No reminders.\n".to_string();
    }
    let mut text = String::new();
    for reminder in reminders {
        let due = reminder
            .trigger()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "--".to_string());
        let fired = if reminder.fired { "  (fired)" } else { "" };
        text.push_str(&format!("  #{}  {}  {}{}\n", reminder.id, due, printable(&reminder.message), fired));
    }
    text
}
