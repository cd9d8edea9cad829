//! Fenced code block extraction.
//!
//! Fences pair up in order of appearance. An odd final marker opens a block
//! that runs to the end of the text and is reported as still streaming.

const FENCE: &str = "```";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Complete,
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
    pub state: FenceState,
}

impl CodeBlock {
    pub fn label(&self) -> &str {
        self.language.as_deref().unwrap_or("code")
    }

    pub fn is_complete(&self) -> bool {
        self.state == FenceState::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Prose(&'a str),
    Code(CodeBlock),
}

pub fn split(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find(FENCE) {
        let open = pos + offset;
        if open > pos {
            segments.push(Segment::Prose(&text[pos..open]));
        }

        let after_marker = open + FENCE.len();
        let label_len = text[after_marker..]
            .find(|c: char| !is_label_char(c))
            .unwrap_or(text.len() - after_marker);
        let label = &text[after_marker..after_marker + label_len];
        let language = (!label.is_empty()).then(|| label.to_string());

        let mut body = after_marker + label_len;
        if text[body..].starts_with("\r\n") {
            body += 2;
        } else if text[body..].starts_with('\n') {
            body += 1;
        }

        match text[body..].find(FENCE) {
            Some(close_offset) => {
                let close = body + close_offset;
                segments.push(
                    Segment::Code(CodeBlock {
                        language,
                        code: trim_final_newline(&text[body..close]).to_string(),
                        state: FenceState::Complete,
                    })
                );
                pos = close + FENCE.len();
            }
            None => {
                segments.push(
                    Segment::Code(CodeBlock {
                        language,
                        code: trim_final_newline(&text[body..]).to_string(),
                        state: FenceState::InProgress,
                    })
                );
                return segments;
            }
        }
    }

    if pos < text.len() {
        segments.push(Segment::Prose(&text[pos..]));
    }
    segments
}

fn is_label_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '+' | '#' | '.')
}

fn trim_final_newline(code: &str) -> &str {
    let code = code.strip_suffix('\n').unwrap_or(code);
    code.strip_suffix('\r').unwrap_or(code)
}
