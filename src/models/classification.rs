use serde::{Deserialize, Serialize};

/// Label assigned to captured input; decides the note's target folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    WorkLog,
    Idea,
    Task,
    Reflection,
    Article,
    ProjectUpdate,
    Question,
    /// General note. Unknown labels from the model land here too.
    #[serde(other)]
    Note,
}

impl Category {
    /// Parses a label, mapping anything unrecognised to [`Category::Note`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "work_log" | "worklog" => Self::WorkLog,
            "idea" => Self::Idea,
            "task" => Self::Task,
            "reflection" => Self::Reflection,
            "article" => Self::Article,
            "project_update" => Self::ProjectUpdate,
            "question" => Self::Question,
            _ => Self::Note,
        }
    }

    /// The snake_case label written to frontmatter `type`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WorkLog => "work_log",
            Self::Idea => "idea",
            Self::Task => "task",
            Self::Reflection => "reflection",
            Self::Article => "article",
            Self::ProjectUpdate => "project_update",
            Self::Question => "question",
            Self::Note => "note",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of classifying a piece of input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    /// Model confidence, clamped to 0.0-1.0.
    pub confidence: f64,
    pub title: String,
    pub suggested_tags: Vec<String>,
    /// Folder the model proposed. Informational; routing uses `category`.
    pub target_folder: Option<String>,
    pub summary: Option<String>,
}

impl Classification {
    /// Creates a classification, clamping `confidence` to 0.0-1.0.
    pub fn new(category: Category, confidence: f64, title: impl Into<String>) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            title: title.into(),
            suggested_tags: Vec::new(),
            target_folder: None,
            summary: None,
        }
    }

    /// Sets the suggested tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.suggested_tags = tags;
        self
    }

    /// Sets the proposed folder.
    #[must_use]
    pub fn with_target_folder(mut self, folder: impl Into<String>) -> Self {
        self.target_folder = Some(folder.into());
        self
    }

    /// Sets the summary.
    #[must_use]
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// A message from the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A message from the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
