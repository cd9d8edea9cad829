//! Conversation view controller.
//!
//! Drives one request at a time through `Idle → Sending → Streaming →
//! Finalizing → Idle` (or `Errored`). `send` holds `&mut self` for the whole
//! request; inside it the only suspension points are the next chunk, the
//! elapsed-time ticker and the cancel signal.

pub mod state;

pub use state::{ ControllerState, Phase };

use futures::StreamExt;
use log::{ error, info, warn };
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{ interval_at, Instant, MissedTickBehavior };
use tokio_stream::wrappers::IntervalStream;

use crate::backend::{ ApiError, Backend };
use crate::config::ControllerConfig;
use crate::models::api::{ ChatRequest, Health };
use crate::models::chat::{ ConversationSummary, MemoryFact, Message, ScheduledReminder };
use crate::render::{ self, Document, RenderOptions };
use crate::stream::{ frames, SessionTag, StatsSnapshot };

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a reply is still streaming")]
    Busy,
    #[error("message is empty")]
    EmptyInput,
    #[error("there is no finished reply to regenerate")]
    NothingToRegenerate,
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)] Api(#[from] ApiError),
}

/// Receives everything the controller wants shown.
pub trait ChatView {
    fn user_message(&mut self, message: &Message);

    fn stream_started(&mut self) {}

    /// A fragment arrived. `html` is the full reply re-rendered with a cursor.
    fn fragment(&mut self, fragment: &str, html: &str, stats: &StatsSnapshot);

    fn tick(&mut self, stats: &StatsSnapshot);

    fn finished(&mut self, message: &Message, html: &str, stats: &StatsSnapshot);

    /// The request failed or was cancelled. `partial_html` holds whatever had
    /// streamed so far.
    fn failed(&mut self, partial_html: &str, error: &ControllerError, stats: Option<&StatsSnapshot>);

    fn conversations_changed(&mut self, _conversations: &[ConversationSummary]) {}

    fn conversation_opened(&mut self, _id: &str, _messages: &[Message]) {}
}

/// Cancels whatever request is in flight when it is triggered. Triggering it
/// while idle has no effect on later requests.
#[derive(Clone)]
pub struct CancelHandle(Arc<watch::Sender<u64>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_modify(|generation| {
            *generation = generation.wrapping_add(1);
        });
    }
}

pub struct ConversationController {
    backend: Arc<dyn Backend>,
    config: ControllerConfig,
    state: ControllerState,
    cancel_tx: Arc<watch::Sender<u64>>,
    cancel_rx: watch::Receiver<u64>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn Backend>, config: ControllerConfig) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(0);
        Self {
            backend,
            config,
            state: ControllerState::new(),
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel_tx))
    }

    /// Parsed form of the latest assistant reply, for copy actions.
    pub fn last_document(&self) -> Option<Document> {
        self.state.last_reply().map(|m| render::parse(&m.content))
    }

    pub async fn health(&self) -> Result<Health, ControllerError> {
        Ok(self.backend.health().await?)
    }

    pub async fn send(
        &mut self,
        input: &str,
        view: &mut dyn ChatView
    ) -> Result<StatsSnapshot, ControllerError> {
        let tag = self.state.begin_send(input, Instant::now())?;
        if let Some(message) = self.state.messages().last() {
            view.user_message(message);
        }

        let mut cancel = self.cancel_rx.clone();
        cancel.borrow_and_update();
        let tick = self.config.tick;
        let mut ticker = interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticker = IntervalStream::new(ticker);

        if self.state.conversation_id().is_none() {
            match self.backend.create_conversation().await {
                Ok(created) => {
                    info!("Started conversation {}", created.id);
                    self.state.set_conversation_id(created.id);
                }
                Err(e) => {
                    return Err(self.abort(tag, e.into(), view));
                }
            }
        }

        let request = self.request();
        let backend = Arc::clone(&self.backend);
        let opened = {
            let pending = backend.chat_stream(&request);
            tokio::pin!(pending);
            loop {
                tokio::select! {
                    result = &mut pending => break Some(result),
                    _ = cancel.changed() => break None,
                    Some(_) = ticker.next() => self.emit_tick(tag, view),
                }
            }
        };
        let body = match opened {
            Some(Ok(body)) => body,
            Some(Err(e)) => {
                return Err(self.abort(tag, e.into(), view));
            }
            None => {
                return Err(self.abort(tag, ControllerError::Cancelled, view));
            }
        };

        self.state.stream_opened(tag);
        view.stream_started();

        let events = frames(body);
        tokio::pin!(events);
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(payload)) => self.ingest(tag, &payload, view),
                    Some(Err(e)) => {
                        return Err(self.abort(tag, e.into(), view));
                    }
                    None => break,
                },
                _ = cancel.changed() => {
                    return Err(self.abort(tag, ControllerError::Cancelled, view));
                }
                Some(_) = ticker.next() => self.emit_tick(tag, view),
            }
        }
        drop(ticker);

        let Some((message, stats)) = self.state.complete(tag, Instant::now()) else {
            return Err(ControllerError::Cancelled);
        };
        let html = render::render(&message.content, RenderOptions::finished());
        view.finished(&message, &html, &stats);

        self.reconcile(view).await;
        self.state.finish();
        Ok(stats)
    }

    /// Drops the last reply and asks again with the same prompt.
    pub async fn regenerate(
        &mut self,
        view: &mut dyn ChatView
    ) -> Result<StatsSnapshot, ControllerError> {
        let prompt = self.state.take_regenerate()?;
        self.send(&prompt, view).await
    }

    pub async fn new_conversation(&mut self, view: &mut dyn ChatView) -> Result<String, ControllerError> {
        self.state.ensure_idle()?;
        let created = self.backend.create_conversation().await?;
        self.state.open_conversation(created.id.clone(), Vec::new());
        view.conversation_opened(&created.id, &[]);
        self.reconcile(view).await;
        Ok(created.id)
    }

    pub async fn open_conversation(
        &mut self,
        id: &str,
        view: &mut dyn ChatView
    ) -> Result<(), ControllerError> {
        self.state.ensure_idle()?;
        let messages = self.backend.get_conversation(id).await?;
        self.state.open_conversation(id.to_string(), messages);
        view.conversation_opened(id, self.state.messages());
        Ok(())
    }

    pub async fn delete_conversation(
        &mut self,
        id: &str,
        view: &mut dyn ChatView
    ) -> Result<(), ControllerError> {
        self.state.ensure_idle()?;
        self.backend.delete_conversation(id).await?;
        if self.state.conversation_id() == Some(id) {
            self.state.reset_conversation();
        }
        self.refresh_conversations(view).await
    }

    pub async fn rename_conversation(
        &mut self,
        title: &str,
        view: &mut dyn ChatView
    ) -> Result<(), ControllerError> {
        self.state.ensure_idle()?;
        let Some(id) = self.state.conversation_id().map(str::to_string) else {
            return Err(ApiError::NotFound("current conversation".to_string()).into());
        };
        self.backend.rename_conversation(&id, title).await?;
        self.refresh_conversations(view).await
    }

    pub async fn refresh_conversations(&mut self, view: &mut dyn ChatView) -> Result<(), ControllerError> {
        let conversations = self.backend.list_conversations().await?;
        self.state.set_conversations(conversations);
        view.conversations_changed(self.state.conversations());
        Ok(())
    }

    pub async fn memory(&self) -> Result<Vec<MemoryFact>, ControllerError> {
        Ok(self.backend.list_memory().await?)
    }

    pub async fn forget(&self, id: i64) -> Result<(), ControllerError> {
        Ok(self.backend.delete_memory(id).await?)
    }

    pub async fn reminders(&self, all: bool) -> Result<Vec<ScheduledReminder>, ControllerError> {
        Ok(self.backend.list_reminders(all).await?)
    }

    pub async fn unremind(&self, id: i64) -> Result<(), ControllerError> {
        Ok(self.backend.delete_reminder(id).await?)
    }

    pub async fn clear_history(&mut self) -> Result<(), ControllerError> {
        self.state.ensure_idle()?;
        Ok(self.backend.clear_history().await?)
    }

    fn request(&self) -> ChatRequest {
        let generation = self.config.generation;
        ChatRequest {
            messages: self.state.messages().to_vec(),
            conversation_id: self.state.conversation_id().map(str::to_string),
            mode: generation.mode,
            stream: true,
            temperature: generation.temperature,
            max_tokens: generation.max_tokens,
        }
    }

    fn ingest(&mut self, tag: SessionTag, payload: &str, view: &mut dyn ChatView) {
        let now = Instant::now();
        let Some(fragment) = self.state.apply_payload(tag, payload, now) else {
            return;
        };
        let Some(session) = self.state.session() else {
            return;
        };
        let html = render::render(session.text(), RenderOptions::streaming());
        let stats = session.stats(now);
        view.fragment(&fragment, &html, &stats);
    }

    fn emit_tick(&self, tag: SessionTag, view: &mut dyn ChatView) {
        if let Some(stats) = self.state.stats(tag, Instant::now()) {
            view.tick(&stats);
        }
    }

    fn abort(&mut self, tag: SessionTag, err: ControllerError, view: &mut dyn ChatView) -> ControllerError {
        match &err {
            ControllerError::Cancelled => warn!("Request cancelled"),
            other => error!("Request failed: {}", other),
        }
        match self.state.fail(tag, Instant::now()) {
            Some((partial, stats)) => {
                let html = render::render(&partial, RenderOptions::finished());
                view.failed(&html, &err, Some(&stats));
            }
            None => view.failed("", &err, None),
        }
        err
    }

    /// Polls the remote listing until the current conversation shows up,
    /// giving up quietly after the configured number of attempts.
    async fn reconcile(&mut self, view: &mut dyn ChatView) {
        let Some(id) = self.state.conversation_id().map(str::to_string) else {
            return;
        };
        let policy = self.config.reconcile;

        for attempt in 1..=policy.attempts {
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.backend.list_conversations().await {
                Ok(conversations) => {
                    let visible = conversations.iter().any(|c| c.id == id);
                    self.state.set_conversations(conversations);
                    if visible {
                        break;
                    }
                    warn!(
                        "Conversation {} not listed yet (attempt {}/{})",
                        id,
                        attempt,
                        policy.attempts
                    );
                }
                Err(e) => {
                    warn!("Failed to refresh conversations (attempt {}/{}): {}", attempt, policy.attempts, e);
                }
            }
        }
        view.conversations_changed(self.state.conversations());
    }
}
