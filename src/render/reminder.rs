//! `[REMIND: when | what]` tags emitted by the assistant.

const MARKER: &[u8] = b"[remind:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub when: String,
    pub what: String,
}

/// Removes every complete reminder tag from `text`, returning the remaining
/// prose and the tags in document order. Incomplete tags are left in place.
pub fn extract(text: &str) -> (String, Vec<Reminder>) {
    let bytes = text.as_bytes();
    let mut prose = String::with_capacity(text.len());
    let mut reminders = Vec::new();
    let mut copied_to = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('[') {
        let open = search_from + offset;
        search_from = open + 1;

        let is_marker = bytes
            .get(open..open + MARKER.len())
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(MARKER));
        if !is_marker {
            continue;
        }
        if let Some((reminder, end)) = match_tag(text, open + MARKER.len()) {
            prose.push_str(&text[copied_to..open]);
            reminders.push(reminder);
            copied_to = end;
            search_from = end;
        }
    }
    prose.push_str(&text[copied_to..]);
    (prose, reminders)
}

// `body` points just past the marker. Returns the tag and the index after `]`.
fn match_tag(text: &str, body: usize) -> Option<(Reminder, usize)> {
    let line_end = text[body..].find('\n').map_or(text.len(), |p| body + p);
    let line = &text[body..line_end];

    let bar = line.find('|')?;
    let when = line[..bar].trim();
    if when.is_empty() {
        return None;
    }
    // The second field owns its first non-blank character, even a `]`.
    let after_bar = &line[bar + 1..];
    let what_start = bar + 1 + (after_bar.len() - after_bar.trim_start().len());
    let first = line[what_start..].chars().next()?;
    let search = what_start + first.len_utf8();
    let close = search + line[search..].find(']')?;
    let what = line[what_start..close].trim_end();

    Some((
        Reminder {
            when: when.to_string(),
            what: what.to_string(),
        },
        body + close + 1,
    ))
}
