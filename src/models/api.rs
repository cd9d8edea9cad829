use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

use super::chat::{ ConversationSummary, MemoryFact, Message, ScheduledReminder };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    Raw,
    Thursday,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseChatModeError {
    message: String,
}

impl fmt::Display for ParseChatModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseChatModeError {}

impl FromStr for ChatMode {
    type Err = ParseChatModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(ChatMode::Raw),
            "thursday" => Ok(ChatMode::Thursday),
            _ =>
                Err(ParseChatModeError {
                    message: format!("Invalid chat mode: '{}'", s),
                }),
        }
    }
}

impl fmt::Display for ChatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMode::Raw => write!(f, "raw"),
            ChatMode::Thursday => write!(f, "thursday"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub conversation_id: Option<String>,
    pub mode: ChatMode,
    pub stream: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub proxy: Option<String>,
    pub llama_server: String,
}

impl Health {
    pub fn llama_ok(&self) -> bool {
        self.llama_server == "ok"
    }
}

#[derive(Debug, Deserialize)]
pub struct ConversationList {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationDetail {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct MemoryList {
    pub facts: Vec<MemoryFact>,
}

#[derive(Debug, Deserialize)]
pub struct ReminderList {
    pub reminders: Vec<ScheduledReminder>,
}

#[derive(Debug, Serialize)]
pub struct RenameRequest<'a> {
    pub title: &'a str,
}

/// One `data:` payload of the completion stream. Only `choices[0].delta.content` is read.
#[derive(Debug, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
}

impl StreamChunk {
    pub fn into_fragment(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|choice| choice.delta.content)
    }
}
