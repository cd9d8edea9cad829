//! Event-line framing for the completion stream.
//!
//! Bytes arrive in arbitrary chunks. [`FrameDecoder`] keeps a single pending
//! partial line plus any incomplete UTF-8 sequence left at the end of the last
//! chunk, so neither a line nor a multi-byte character can be torn by a chunk
//! boundary.

use futures::{ Stream, StreamExt };
use std::collections::VecDeque;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Payload of a `data:` line, not yet parsed.
    Data(String),
    /// The terminator line. Nothing after it is decoded.
    Done,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8_tail: Vec<u8>,
    pending: String,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The partial line carried over to the next chunk.
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        self.decode_utf8(chunk);

        let Some(last_newline) = self.pending.rfind('\n') else {
            return frames;
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);

        for line in complete[..complete.len() - 1].split('\n') {
            if self.accept_line(line, &mut frames) {
                break;
            }
        }
        frames
    }

    /// Flushes whatever is left once the byte stream has ended. A final line
    /// without a trailing newline is still decoded.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }
        if !self.utf8_tail.is_empty() {
            let tail = std::mem::take(&mut self.utf8_tail);
            self.pending.push_str(&String::from_utf8_lossy(&tail));
        }
        let last = std::mem::take(&mut self.pending);
        self.accept_line(&last, &mut frames);
        self.finished = true;
        frames
    }

    // Returns true once the terminator has been seen.
    fn accept_line(&mut self, line: &str, frames: &mut Vec<Frame>) -> bool {
        match parse_line(line) {
            Some(Frame::Done) => {
                frames.push(Frame::Done);
                self.finished = true;
                self.pending.clear();
                self.utf8_tail.clear();
                true
            }
            Some(frame) => {
                frames.push(frame);
                false
            }
            None => false,
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        let mut input = std::mem::take(&mut self.utf8_tail);
        input.extend_from_slice(chunk);

        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    self.pending.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        self.pending.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            self.pending.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.utf8_tail = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }
}

/// Classifies one line. Blank lines, comments and non-data fields yield `None`.
pub fn parse_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    let trimmed = payload.trim();
    if trimmed == DONE_SENTINEL {
        Some(Frame::Done)
    } else if trimmed.is_empty() {
        None
    } else {
        Some(Frame::Data(payload.to_string()))
    }
}

struct FrameState<S> {
    chunks: S,
    decoder: FrameDecoder,
    ready: VecDeque<Frame>,
    exhausted: bool,
}

/// Lazily turns a stream of byte chunks into `data:` payloads, ending at the
/// terminator or at the end of input. A read error is yielded once and ends
/// the sequence.
pub fn frames<S, B, E>(chunks: S) -> impl Stream<Item = Result<String, E>>
    where S: Stream<Item = Result<B, E>> + Unpin, B: AsRef<[u8]>
{
    let state = FrameState {
        chunks,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        exhausted: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return match frame {
                    Frame::Data(payload) => Some((Ok(payload), state)),
                    Frame::Done => None,
                };
            }
            if state.exhausted {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    let decoded = state.decoder.push(chunk.as_ref());
                    state.ready.extend(decoded);
                }
                Some(Err(e)) => {
                    state.exhausted = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.exhausted = true;
                    let decoded = state.decoder.finish();
                    state.ready.extend(decoded);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn splits_lines_and_keeps_partial_fragment() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\"");
        assert_eq!(frames, vec![Frame::Data("{\"a\":1}".into())]);
        assert_eq!(decoder.pending(), "data: {\"b\"");

        let frames = decoder.push(b":2}\n");
        assert_eq!(frames, vec![Frame::Data("{\"b\":2}".into())]);
        assert_eq!(decoder.pending(), "");
    }

    #[test]
    fn discards_comments_and_other_fields() {
        let frames = decode_all(&[b": keep-alive\nevent: message\nid: 7\n\ndata: x\n"]);
        assert_eq!(frames, vec![Frame::Data("x".into())]);
    }

    #[test]
    fn accepts_crlf_and_missing_space() {
        let frames = decode_all(&[b"data:{}\r\ndata: [DONE]\r\n"]);
        assert_eq!(frames, vec![Frame::Data("{}".into()), Frame::Done]);
    }

    #[test]
    fn terminator_ends_decoding() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: a\ndata: [DONE]\ndata: b\n");
        assert_eq!(frames, vec![Frame::Data("a".into()), Frame::Done]);
        assert!(decoder.is_finished());
        assert!(decoder.push(b"data: c\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn final_line_without_newline_is_flushed() {
        let frames = decode_all(&[b"data: tail"]);
        assert_eq!(frames, vec![Frame::Data("tail".into())]);
    }

    #[test]
    fn multibyte_characters_survive_any_split() {
        let stream = "data: {\"t\":\"h\u{e9}llo \u{1f600} \u{4e16}\u{754c}\"}\ndata: [DONE]\n".as_bytes();
        let expected = decode_all(&[stream]);
        for split in 0..=stream.len() {
            let (a, b) = stream.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at byte {}", split);
        }
    }

    #[test]
    fn byte_at_a_time_matches_whole() {
        let stream = "data: \u{1f680}\n\ndata: b\n".as_bytes();
        let singles: Vec<&[u8]> = stream.chunks(1).collect();
        assert_eq!(decode_all(&singles), decode_all(&[stream]));
    }

    #[test]
    fn invalid_bytes_become_replacement_characters() {
        let frames = decode_all(&[b"data: a\xffb\n"]);
        assert_eq!(frames, vec![Frame::Data("a\u{fffd}b".into())]);
    }

    #[tokio::test]
    async fn async_adapter_yields_payloads_until_done() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: one\nda".to_vec()),
            Ok(b"ta: two\ndata: [DONE]\ndata: three\n".to_vec())
        ];
        let payloads: Vec<_> = frames(futures::stream::iter(chunks)).collect().await;
        assert_eq!(payloads, vec![Ok("one".to_string()), Ok("two".to_string())]);
    }

    #[tokio::test]
    async fn async_adapter_surfaces_read_error_once() {
        let chunks: Vec<Result<Vec<u8>, String>> = vec![
            Ok(b"data: one\n".to_vec()),
            Err("reset".to_string()),
            Ok(b"data: never\n".to_vec())
        ];
        let payloads: Vec<_> = frames(futures::stream::iter(chunks)).collect().await;
        assert_eq!(payloads, vec![Ok("one".to_string()), Err("reset".to_string())]);
    }
}
