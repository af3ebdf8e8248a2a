use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::frontmatter::Metadata;
use crate::models::{ChatMessage, Classification, DailyLog, NoteSummary};

/// Default number of items in a timeline.
pub const DEFAULT_TIMELINE_LIMIT: usize = 50;

/// Raw input to be classified and filed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub content: String,
    /// How the content arrived, `text` or `voice`. Stored as `input_type`.
    pub input_type: String,
    /// Extra frontmatter, merged over the generated fields.
    pub metadata: Option<Metadata>,
}

impl CaptureRequest {
    /// A typed capture.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            input_type: "text".to_string(),
            metadata: None,
        }
    }

    /// A capture transcribed from audio.
    pub fn voice(content: impl Into<String>) -> Self {
        Self {
            input_type: "voice".to_string(),
            ..Self::text(content)
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Where a capture was filed and how it was classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub classification: Classification,
    /// `false` when the model failed and the fallback classification was used.
    pub classified: bool,
}

/// A chat turn from the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ChatMessage>,
    /// Include recent note titles as context for the model.
    pub include_context: bool,
}

impl ChatRequest {
    /// A message with no history and vault context enabled.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            include_context: true,
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn without_context(mut self) -> Self {
        self.include_context = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
}

/// Time window applied to a timeline, by `created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineFilter {
    /// Created on today's local date.
    Today,
    /// Created within the last 7 days.
    Week,
    /// Created within the last 30 days.
    Month,
}

impl FromStr for TimelineFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(format!(
                "unknown timeline filter '{other}' (expected today, week or month)"
            )),
        }
    }
}

impl fmt::Display for TimelineFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        })
    }
}

/// Parameters for [`KnowledgeService::timeline`](crate::KnowledgeService::timeline).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineQuery {
    pub folder: Option<String>,
    pub limit: usize,
    pub filter: Option<TimelineFilter>,
}

impl Default for TimelineQuery {
    fn default() -> Self {
        Self {
            folder: None,
            limit: DEFAULT_TIMELINE_LIMIT,
            filter: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub items: Vec<NoteSummary>,
    /// Number of items returned.
    pub total: usize,
    /// More matching notes exist beyond `limit`.
    pub has_more: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today_entries: usize,
    pub week_entries: usize,
    pub active_projects: usize,
    pub active_articles: usize,
}

/// A project note as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    /// Frontmatter `status`, `active` when absent.
    pub status: String,
    /// Frontmatter `progress`, clamped to 0-100.
    pub progress: f64,
    pub last_update: Option<String>,
    pub folder_path: String,
}

/// A writing-folder note as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    /// Whitespace-separated words in the body.
    pub word_count: usize,
    /// Frontmatter `status`, `draft` when absent.
    pub status: String,
    pub last_update: Option<String>,
    pub folder_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub daily_log: DailyLog,
    pub active_projects: Vec<ProjectSummary>,
    pub active_articles: Vec<ArticleSummary>,
    pub recent_items: Vec<NoteSummary>,
}
