pub mod http;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::models::api::{ ChatRequest, Health };
use crate::models::chat::{ ConversationSummary, MemoryFact, Message, ScheduledReminder };

pub use http::HttpBackend;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")] Transport(#[from] reqwest::Error),
    #[error("server returned HTTP {status}")] Status {
        status: u16,
        body: String,
    },
    #[error("unexpected response body: {0}")] Decode(#[from] serde_json::Error),
    #[error("invalid URL: {0}")] Url(#[from] url::ParseError),
    #[error("{0} not found")] NotFound(String),
    #[error("stream read failed: {0}")] Stream(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::NotFound(_) => Some(404),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Raw body of a streaming completion, chunked however the transport delivers it.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, ApiError>> + Send>>;

/// The chat backend: conversation storage, long-term memory and the
/// streaming completion endpoint.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn health(&self) -> Result<Health, ApiError>;

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError>;

    async fn create_conversation(&self) -> Result<ConversationSummary, ApiError>;

    async fn get_conversation(&self, id: &str) -> Result<Vec<Message>, ApiError>;

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError>;

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError>;

    async fn list_memory(&self) -> Result<Vec<MemoryFact>, ApiError>;

    async fn delete_memory(&self, id: i64) -> Result<(), ApiError>;

    async fn clear_history(&self) -> Result<(), ApiError>;

    /// Pending reminders, or with `all` the most recent ones including fired.
    async fn list_reminders(&self, all: bool) -> Result<Vec<ScheduledReminder>, ApiError>;

    async fn delete_reminder(&self, id: i64) -> Result<(), ApiError>;

    /// Starts a completion. Resolves once response headers arrive; a
    /// non-success status is an error, not an empty stream.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError>;
}
