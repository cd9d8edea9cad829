use chrono::{ DateTime, TimeZone, Utc };
use serde::{ Deserialize, Serialize };
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A committed chat turn. Never mutated after it is pushed onto a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One row of the remote conversation listing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub created_at: Option<f64>,
    #[serde(default)]
    pub updated_at: f64,
}

fn default_title() -> String {
    "New Chat".to_string()
}

impl ConversationSummary {
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        unix_seconds(self.updated_at)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryFact {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub created_at: Option<f64>,
}

/// A reminder the backend scheduled from a `[REMIND: ...]` tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledReminder {
    pub id: i64,
    pub message: String,
    pub trigger_at: f64,
    #[serde(default)]
    pub created_at: Option<f64>,
    /// Only reported by the full listing; active reminders have not fired.
    #[serde(default)]
    pub fired: bool,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

impl ScheduledReminder {
    pub fn trigger(&self) -> Option<DateTime<Utc>> {
        unix_seconds(self.trigger_at)
    }
}

fn unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.trunc() as i64;
    let nanos = (secs.fract() * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}
