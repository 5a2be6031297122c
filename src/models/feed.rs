use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry in the user's personalized feed.
///
/// Feed items are produced by the backend from the user's integrations and
/// are never modified by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub item_type: FeedItemType,
    pub priority: FeedPriority,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub title: String,
    pub subtitle: Option<String>,
    pub description: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub image_url: Option<String>,
    pub source: FeedSource,
    pub source_id: String,
    pub metadata_schema: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_items: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
    pub status: FeedStatus,
    pub snooze_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub actions: Vec<FeedAction>,
    #[serde(default)]
    pub interaction_history: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedItemType {
    Task,
    Event,
    Reminder,
    Notification,
    #[serde(other)]
    Unknown,
}

impl FeedItemType {
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Task => "✓",
            Self::Event => "📅",
            Self::Reminder => "🔔",
            Self::Notification => "📢",
            Self::Unknown => "•",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedPriority {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

impl FeedPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedStatus {
    New,
    Read,
    Completed,
    Archived,
    Snoozed,
    #[serde(other)]
    Unknown,
}

/// Where a feed item came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub account_id: String,
    pub integration_name: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

/// An action the backend offers on a feed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response of `GET /api/feed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedResponse {
    pub items: Vec<FeedItem>,
    pub count: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Query parameters for `GET /api/feed`. Unset fields are omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_expired: Option<bool>,
}

impl FeedQuery {
    pub fn page(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            include_expired: None,
        }
    }
}
