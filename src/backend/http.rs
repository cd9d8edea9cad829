use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, error };
use reqwest::{ Client as HttpClient, Response, StatusCode };
use reqwest::header::{ HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE };
use std::time::Duration;
use url::Url;

use super::{ ApiError, Backend, ByteStream };
use crate::models::api::{
    ChatRequest,
    ConversationDetail,
    ConversationList,
    Health,
    MemoryList,
    ReminderList,
    RenameRequest,
};
use crate::models::chat::{ ConversationSummary, MemoryFact, Message, ScheduledReminder };

pub struct HttpBackend {
    http: HttpClient,
    streaming: HttpClient,
    base_url: Url,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = HttpClient::builder()
            .default_headers(headers.clone())
            .timeout(request_timeout)
            .build()?;
        // Completions may legitimately run for minutes; only the connect phase is bounded.
        let streaming = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(request_timeout)
            .build()?;

        Ok(Self {
            http,
            streaming,
            base_url,
            request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn checked(response: Response, what: &str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        error!("{} failed with HTTP {}: {}", what, status, body);
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<Health, ApiError> {
        let resp = self.http.get(self.endpoint("health")?).send().await?;
        Ok(Self::checked(resp, "health").await?.json::<Health>().await?)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        let resp = self.http.get(self.endpoint("v1/conversations")?).send().await?;
        let list = Self::checked(resp, "conversation list").await?.json::<ConversationList>().await?;
        Ok(list.conversations)
    }

    async fn create_conversation(&self) -> Result<ConversationSummary, ApiError> {
        let resp = self.http.post(self.endpoint("v1/conversations")?).send().await?;
        let created = Self::checked(resp, "conversation").await?.json::<ConversationSummary>().await?;
        debug!("Created conversation {}", created.id);
        Ok(created)
    }

    async fn get_conversation(&self, id: &str) -> Result<Vec<Message>, ApiError> {
        let url = self.endpoint(&format!("v1/conversations/{}", id))?;
        let resp = self.http.get(url).send().await?;
        let what = format!("conversation {}", id);
        let detail = Self::checked(resp, &what).await?.json::<ConversationDetail>().await?;
        Ok(detail.messages)
    }

    async fn delete_conversation(&self, id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("v1/conversations/{}", id))?;
        let resp = self.http.delete(url).send().await?;
        Self::checked(resp, &format!("conversation {}", id)).await?;
        Ok(())
    }

    async fn rename_conversation(&self, id: &str, title: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("v1/conversations/{}", id))?;
        let resp = self.http.patch(url).json(&(RenameRequest { title })).send().await?;
        Self::checked(resp, &format!("conversation {}", id)).await?;
        Ok(())
    }

    async fn list_memory(&self) -> Result<Vec<MemoryFact>, ApiError> {
        let resp = self.http.get(self.endpoint("v1/memory")?).send().await?;
        Ok(Self::checked(resp, "memory").await?.json::<MemoryList>().await?.facts)
    }

    async fn delete_memory(&self, id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("v1/memory/{}", id))?;
        let resp = self.http.delete(url).send().await?;
        Self::checked(resp, &format!("memory fact {}", id)).await?;
        Ok(())
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        let resp = self.http.post(self.endpoint("v1/clear")?).send().await?;
        Self::checked(resp, "history").await?;
        Ok(())
    }

    async fn list_reminders(&self, all: bool) -> Result<Vec<ScheduledReminder>, ApiError> {
        let path = if all { "v1/reminders/all" } else { "v1/reminders" };
        let resp = self.http.get(self.endpoint(path)?).send().await?;
        Ok(Self::checked(resp, "reminders").await?.json::<ReminderList>().await?.reminders)
    }

    async fn delete_reminder(&self, id: i64) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("v1/reminders/{}", id))?;
        let resp = self.http.delete(url).send().await?;
        Self::checked(resp, &format!("reminder {}", id)).await?;
        Ok(())
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ApiError> {
        let resp = self.streaming
            .post(self.endpoint("v1/chat/completions")?)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!("Chat completion failed with HTTP {}: {}", status, body);
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes_stream().map(|chunk| {
            chunk.map(|bytes| bytes.to_vec()).map_err(ApiError::from)
        });
        Ok(Box::pin(body))
    }
}
