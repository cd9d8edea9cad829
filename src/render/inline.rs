//! Inline spans inside one line of prose: `code`, **strong** and *emphasis*.
//!
//! Code spans are cut out first so their contents are never styled. Strong
//! spans come next, then emphasis on whatever text is left. A `*` touching
//! another `*` never opens or closes emphasis.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Strong(Vec<Inline>),
    Emphasis(Vec<Inline>),
    LineBreak,
}

pub fn parse(line: &str) -> Vec<Inline> {
    let mut spans = Vec::new();
    let bytes = line.as_bytes();
    let mut plain_from = 0;
    let mut i = 0;

    while let Some(offset) = line[i..].find('`') {
        let open = i + offset;
        match line[open + 1..].find('`') {
            Some(0) => {
                // "``" can't hold a span; retry from the second tick.
                i = open + 1;
            }
            Some(len) => {
                let close = open + 1 + len;
                push_styled(&mut spans, &line[plain_from..open]);
                spans.push(Inline::Code(line[open + 1..close].to_string()));
                plain_from = close + 1;
                i = close + 1;
            }
            None => {
                break;
            }
        }
        if i >= bytes.len() {
            break;
        }
    }
    push_styled(&mut spans, &line[plain_from..]);
    spans
}

fn push_styled(spans: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    let mut rest = text;
    while let Some((before, inner, after)) = find_strong(rest) {
        push_emphasis(spans, before);
        spans.push(Inline::Strong(emphasis(inner)));
        rest = after;
    }
    push_emphasis(spans, rest);
}

fn find_strong(text: &str) -> Option<(&str, &str, &str)> {
    let open = text.find("**")?;
    let body = open + 2;
    // The span needs at least one character, so the search starts one past the body.
    let first = text[body..].chars().next()?;
    let search = body + first.len_utf8();
    let close = search + text[search..].find("**")?;
    Some((&text[..open], &text[body..close], &text[close + 2..]))
}

fn emphasis(text: &str) -> Vec<Inline> {
    let mut spans = Vec::new();
    push_emphasis(&mut spans, text);
    spans
}

fn push_emphasis(spans: &mut Vec<Inline>, text: &str) {
    let bytes = text.as_bytes();
    let lone_star = |i: usize| {
        bytes[i] == b'*' &&
            (i == 0 || bytes[i - 1] != b'*') &&
            bytes.get(i + 1).is_some_and(|&b| b != b'*')
    };
    // A closing star may end the text.
    let closing_star = |i: usize| {
        bytes[i] == b'*' &&
            bytes[i - 1] != b'*' &&
            bytes.get(i + 1).map_or(true, |&b| b != b'*')
    };

    let mut plain_from = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !lone_star(i) {
            i += 1;
            continue;
        }
        match (i + 2..bytes.len()).find(|&j| closing_star(j)) {
            Some(close) => {
                push_text(spans, &text[plain_from..i]);
                spans.push(Inline::Emphasis(vec![Inline::Text(text[i + 1..close].to_string())]));
                plain_from = close + 1;
                i = close + 1;
            }
            None => {
                break;
            }
        }
    }
    push_text(spans, &text[plain_from..]);
}

fn push_text(spans: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(last)) = spans.last_mut() {
        last.push_str(text);
    } else {
        spans.push(Inline::Text(text.to_string()));
    }
}
