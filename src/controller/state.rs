use log::debug;
use tokio::time::Instant;

use super::ControllerError;
use crate::models::chat::{ ConversationSummary, Message, Role };
use crate::stream::{ estimate_tokens, SessionTag, StatsSnapshot, StreamSession };

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Sending,
    Streaming,
    Finalizing,
    /// The last request failed. Behaves like `Idle` for new input.
    Errored,
}

impl Phase {
    pub fn is_busy(self) -> bool {
        matches!(self, Phase::Sending | Phase::Streaming | Phase::Finalizing)
    }
}

/// Everything the conversation view shows, mutated only through the
/// transition methods below. Events for a session that is no longer the
/// active one are ignored.
#[derive(Debug, Default)]
pub struct ControllerState {
    phase: Phase,
    conversation_id: Option<String>,
    messages: Vec<Message>,
    conversations: Vec<ConversationSummary>,
    session: Option<StreamSession>,
    next_tag: u64,
    last_stats: Option<StatsSnapshot>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn last_stats(&self) -> Option<&StatsSnapshot> {
        self.last_stats.as_ref()
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    pub fn active_tag(&self) -> Option<SessionTag> {
        self.session.as_ref().map(StreamSession::tag)
    }

    pub fn ensure_idle(&self) -> Result<(), ControllerError> {
        if self.phase.is_busy() {
            Err(ControllerError::Busy)
        } else {
            Ok(())
        }
    }

    /// `Idle → Sending`. Appends the user turn optimistically and opens a session.
    pub fn begin_send(&mut self, input: &str, now: Instant) -> Result<SessionTag, ControllerError> {
        self.ensure_idle()?;
        if input.trim().is_empty() {
            return Err(ControllerError::EmptyInput);
        }

        self.messages.push(Message::user(input));
        self.next_tag += 1;
        let tag = SessionTag(self.next_tag);
        let estimate = estimate_tokens(&self.messages);
        self.session = Some(StreamSession::new(tag, now, estimate));
        self.phase = Phase::Sending;
        Ok(tag)
    }

    pub fn set_conversation_id(&mut self, id: String) {
        self.conversation_id = Some(id);
    }

    /// `Sending → Streaming`.
    pub fn stream_opened(&mut self, tag: SessionTag) -> bool {
        if !self.is_active(tag) || self.phase != Phase::Sending {
            return false;
        }
        self.phase = Phase::Streaming;
        true
    }

    /// Feeds one event payload to the active session, returning the fragment it added.
    pub fn apply_payload(&mut self, tag: SessionTag, payload: &str, now: Instant) -> Option<String> {
        if self.phase != Phase::Streaming {
            return None;
        }
        match self.session.as_mut() {
            Some(session) if session.tag() == tag => session.apply(payload, now).map(str::to_string),
            _ => {
                debug!("Dropping event for stale session {:?}", tag);
                None
            }
        }
    }

    pub fn stats(&self, tag: SessionTag, now: Instant) -> Option<StatsSnapshot> {
        self.session
            .as_ref()
            .filter(|session| session.tag() == tag)
            .map(|session| session.stats(now))
    }

    /// `Streaming → Finalizing`. Commits the assistant reply unless it is empty.
    pub fn complete(&mut self, tag: SessionTag, now: Instant) -> Option<(Message, StatsSnapshot)> {
        if self.phase != Phase::Streaming || !self.is_active(tag) {
            return None;
        }
        let session = self.session.take()?;
        let stats = session.stats(now);
        let message = Message::assistant(session.into_text());
        // A reply with no content is shown but never becomes history.
        if message.content.trim().is_empty() {
            debug!("Stream {:?} ended without content", tag);
        } else {
            self.messages.push(message.clone());
        }
        self.last_stats = Some(stats);
        self.phase = Phase::Finalizing;
        Some((message, stats))
    }

    /// `Finalizing → Idle`.
    pub fn finish(&mut self) {
        if self.phase == Phase::Finalizing {
            self.phase = Phase::Idle;
        }
    }

    /// `Sending | Streaming → Errored`. Returns the partial reply so it can
    /// still be shown; it is not committed as a message.
    pub fn fail(&mut self, tag: SessionTag, now: Instant) -> Option<(String, StatsSnapshot)> {
        if !matches!(self.phase, Phase::Sending | Phase::Streaming) || !self.is_active(tag) {
            return None;
        }
        let session = self.session.take()?;
        let stats = session.stats(now);
        self.last_stats = Some(stats);
        self.phase = Phase::Errored;
        Some((session.into_text(), stats))
    }

    /// Drops the last assistant reply and the user turn before it, returning
    /// that user turn for resubmission. Only valid while idle.
    pub fn take_regenerate(&mut self) -> Result<String, ControllerError> {
        if self.phase != Phase::Idle {
            return Err(ControllerError::NothingToRegenerate);
        }
        let n = self.messages.len();
        let regenerable = n >= 2 &&
            self.messages[n - 1].role == Role::Assistant &&
            self.messages[n - 2].role == Role::User &&
            !self.messages[n - 2].content.trim().is_empty();
        if !regenerable {
            return Err(ControllerError::NothingToRegenerate);
        }
        self.messages.pop();
        let prompt = self.messages.pop().map(|m| m.content).unwrap_or_default();
        Ok(prompt)
    }

    pub fn open_conversation(&mut self, id: String, messages: Vec<Message>) {
        self.conversation_id = Some(id);
        self.messages = messages;
        self.last_stats = None;
        self.phase = Phase::Idle;
    }

    pub fn reset_conversation(&mut self) {
        self.conversation_id = None;
        self.messages.clear();
        self.last_stats = None;
        self.phase = Phase::Idle;
    }

    pub fn set_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        self.conversations = conversations;
    }

    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }

    fn is_active(&self, tag: SessionTag) -> bool {
        self.active_tag() == Some(tag)
    }
}
