//! Capture and read views over the vault.
//!
//! `KnowledgeService` ties the [`VaultStore`] to an [`Assistant`]: it files
//! free-form input into the right folder, answers chat messages with vault
//! context, and shapes listings into the timeline and dashboard views.

mod types;

use std::sync::Arc;

use thiserror::Error;
use time::Duration;
use tracing::{info, warn};

use crate::config::FolderLayout;
use crate::frontmatter::Metadata;
use crate::health::{self, HealthReport};
use crate::llm::{Assistant, LlmError, fallback_title};
use crate::models::{Category, Classification, ListOptions, NewNote, NoteSummary};
use crate::utils::{now_local, now_timestamp, parse_timestamp, same_local_day};
use crate::vault::{VaultError, VaultStore};

pub use types::{
    ArticleSummary, CaptureOutcome, CaptureRequest, ChatReply, ChatRequest, DEFAULT_TIMELINE_LIMIT,
    Dashboard, DashboardStats, ProjectSummary, Timeline, TimelineFilter, TimelineQuery,
};

/// Confidence recorded when the model could not classify the input.
const FALLBACK_CONFIDENCE: f64 = 0.0;
/// Notes listed when building chat context.
const CHAT_CONTEXT_SCAN: usize = 10;
/// Note titles included in chat context.
const CHAT_CONTEXT_TITLES: usize = 5;
const DASHBOARD_PROJECT_SCAN: usize = 20;
const DASHBOARD_ARTICLE_SCAN: usize = 10;
const DASHBOARD_SHOWN: usize = 5;
const DASHBOARD_RECENT: usize = 10;
const FOLDER_LISTING_LIMIT: usize = 50;

/// Errors returned by [`KnowledgeService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Capture content was empty or whitespace.
    #[error("Content must not be empty")]
    EmptyContent,

    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The audio could not be transcribed.
    #[error("Transcription failed: {0}")]
    Transcription(#[source] LlmError),
}

/// Capture, chat and read views over a vault.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use kvault::llm::UnconfiguredAssistant;
/// use kvault::{CaptureRequest, KnowledgeService, VaultConfig, VaultStore};
///
/// # fn main() -> anyhow::Result<()> {
/// let dir = tempfile::tempdir()?;
/// let store = VaultStore::new(VaultConfig::new(dir.path()));
/// let service = KnowledgeService::new(store, Arc::new(UnconfiguredAssistant));
///
/// // Without a model the capture is filed as a plain note under Ideas.
/// let outcome = service.capture(CaptureRequest::text("Try sourdough this weekend"))?;
/// assert!(!outcome.classified);
/// assert!(outcome.file_path.starts_with("01_Execution/Daily_Operations/Ideas/"));
/// # Ok(())
/// # }
/// ```
pub struct KnowledgeService {
    store: VaultStore,
    assistant: Arc<dyn Assistant>,
}

impl KnowledgeService {
    /// Creates a service over `store`, using `assistant` for model calls.
    pub fn new(store: VaultStore, assistant: Arc<dyn Assistant>) -> Self {
        Self { store, assistant }
    }

    /// The underlying store, for direct note operations.
    pub fn store(&self) -> &VaultStore {
        &self.store
    }

    fn layout(&self) -> &FolderLayout {
        self.store.config().layout()
    }

    /// Classifies `request.content` and files it as a new note.
    ///
    /// When classification fails the input is still saved, as a `note` in the
    /// ideas folder; `classified` is then `false`. Caller metadata is merged
    /// over the generated `type`, `tags`, `ai_confidence` and `input_type`.
    ///
    /// # Errors
    ///
    /// [`ServiceError::EmptyContent`] for blank input; store failures.
    pub fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, ServiceError> {
        if request.content.trim().is_empty() {
            return Err(ServiceError::EmptyContent);
        }

        let context = serde_json::json!({ "timestamp": now_timestamp() });
        let (mut classification, classified) =
            match self.assistant.classify(&request.content, Some(&context)) {
                Ok(classification) => (classification, true),
                Err(e) => {
                    warn!(error = %e, "Classification failed, filing as a plain note");
                    (self.fallback_classification(&request.content), false)
                }
            };

        if classification.title.trim().is_empty() {
            classification.title = fallback_title(&request.content);
        }

        let category = classification.category;
        let folder = self.folder_for(category).to_string();

        let mut metadata = Metadata::new()
            .with("type", category.as_str())
            .with("tags", classification.suggested_tags.clone())
            .with("ai_confidence", classification.confidence)
            .with("input_type", request.input_type.as_str());
        if let Some(extra) = request.metadata {
            metadata.merge(extra);
        }

        let note = NewNote::builder()
            .title(classification.title.clone())
            .body(request.content)
            .folder(folder)
            .metadata(metadata)
            .build();
        let created = self.store.create_note(note)?;
        info!(path = %created.file_path, %category, classified, "Captured input");

        Ok(CaptureOutcome {
            success: true,
            message: format!("Saved to {category}"),
            file_path: created.file_path,
            classification,
            classified,
        })
    }

    /// Replies to a chat message.
    ///
    /// With `include_context`, the titles of the most recently modified notes
    /// are passed to the model. This call does not fail: a model error is
    /// turned into an apologetic reply that includes the error text.
    pub fn chat(&self, request: &ChatRequest) -> ChatReply {
        let context = if request.include_context {
            self.recent_notes_context()
        } else {
            None
        };

        let response = match self
            .assistant
            .chat(&request.message, &request.history, context.as_deref())
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Chat request failed");
                format!("Sorry, I ran into a problem: {e}")
            }
        };

        ChatReply { response }
    }

    /// Transcribes an audio clip.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Transcription`] with the model error.
    pub fn transcribe(&self, audio: &[u8], file_name: &str) -> Result<String, ServiceError> {
        self.assistant
            .transcribe(audio, file_name)
            .map_err(ServiceError::Transcription)
    }

    /// Lists notes newest first, optionally restricted to a folder and a time
    /// window.
    ///
    /// # Errors
    ///
    /// Store failures, such as a missing vault root.
    pub fn timeline(&self, query: &TimelineQuery) -> Result<Timeline, ServiceError> {
        let notes = self.store.list_notes(&ListOptions {
            folder: query.folder.clone(),
            ..Default::default()
        })?;

        let mut matching: Vec<NoteSummary> = match query.filter {
            Some(filter) => notes
                .into_iter()
                .filter(|note| created_in(note, filter))
                .collect(),
            None => notes,
        };

        let has_more = matching.len() > query.limit;
        matching.truncate(query.limit);

        Ok(Timeline {
            total: matching.len(),
            items: matching,
            has_more,
        })
    }

    /// Builds the dashboard: stats, today's daily log (created if missing),
    /// active projects, articles in progress and recent notes.
    ///
    /// # Errors
    ///
    /// Store failures while listing the vault or creating the daily log.
    pub fn dashboard(&self) -> Result<Dashboard, ServiceError> {
        let all_notes = self.store.list_notes(&ListOptions::default())?;
        let today_entries = all_notes
            .iter()
            .filter(|n| created_in(n, TimelineFilter::Today))
            .count();
        let week_entries = all_notes
            .iter()
            .filter(|n| created_in(n, TimelineFilter::Week))
            .count();

        let active_projects = self.active_projects()?;
        let active_articles = self.active_articles()?;
        let daily_log = self.store.get_daily_log(None)?;

        let stats = DashboardStats {
            today_entries,
            week_entries,
            active_projects: active_projects.len(),
            active_articles: active_articles.len(),
        };

        Ok(Dashboard {
            stats,
            daily_log,
            active_projects: active_projects.into_iter().take(DASHBOARD_SHOWN).collect(),
            active_articles: active_articles.into_iter().take(DASHBOARD_SHOWN).collect(),
            recent_items: all_notes.into_iter().take(DASHBOARD_RECENT).collect(),
        })
    }

    /// Notes in the projects folder, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn projects(&self) -> Result<Vec<NoteSummary>, ServiceError> {
        self.folder_listing(&self.layout().projects)
    }

    /// Notes in the writing folder, newest first.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub fn articles(&self) -> Result<Vec<NoteSummary>, ServiceError> {
        self.folder_listing(&self.layout().writing)
    }

    /// Checks the vault and model configuration.
    pub fn health(&self) -> HealthReport {
        health::check(&self.store, self.assistant.as_ref())
    }

    fn folder_for(&self, category: Category) -> &str {
        let layout = self.layout();
        match category {
            Category::WorkLog => &layout.daily_logs,
            Category::Task => &layout.tasks,
            Category::ProjectUpdate => &layout.projects,
            Category::Article => &layout.writing,
            Category::Idea | Category::Reflection | Category::Question | Category::Note => {
                &layout.ideas
            }
        }
    }

    fn fallback_classification(&self, content: &str) -> Classification {
        Classification::new(Category::Note, FALLBACK_CONFIDENCE, fallback_title(content))
            .with_target_folder(self.layout().ideas.clone())
    }

    fn recent_notes_context(&self) -> Option<String> {
        let options = ListOptions {
            limit: Some(CHAT_CONTEXT_SCAN),
            ..Default::default()
        };
        match self.store.list_notes(&options) {
            Ok(notes) => {
                let titles: Vec<String> = notes
                    .iter()
                    .take(CHAT_CONTEXT_TITLES)
                    .map(|n| format!("- {}", n.title))
                    .collect();
                Some(format!("Recent notes:\n{}", titles.join("\n")))
            }
            Err(e) => {
                warn!(error = %e, "Could not list notes for chat context");
                None
            }
        }
    }

    fn active_projects(&self) -> Result<Vec<ProjectSummary>, ServiceError> {
        let notes = self.store.list_notes(&ListOptions {
            folder: Some(self.layout().projects.clone()),
            limit: Some(DASHBOARD_PROJECT_SCAN),
            ..Default::default()
        })?;

        Ok(notes
            .into_iter()
            .filter(|n| n.metadata.get_str("status") != Some("completed"))
            .map(|n| ProjectSummary {
                status: n.metadata.get_str("status").unwrap_or("active").to_string(),
                progress: n
                    .metadata
                    .get_f64("progress")
                    .map_or(0.0, |p| p.clamp(0.0, 100.0)),
                name: n.title,
                last_update: n.modified,
                folder_path: n.file_path,
            })
            .collect())
    }

    fn active_articles(&self) -> Result<Vec<ArticleSummary>, ServiceError> {
        let notes = self.store.list_notes(&ListOptions {
            folder: Some(self.layout().writing.clone()),
            limit: Some(DASHBOARD_ARTICLE_SCAN),
            ..Default::default()
        })?;

        Ok(notes
            .into_iter()
            .map(|n| {
                let word_count = match self.store.read_note(&n.file_path) {
                    Ok(note) => note.body.split_whitespace().count(),
                    Err(e) => {
                        warn!(path = %n.file_path, error = %e, "Could not count words");
                        0
                    }
                };
                ArticleSummary {
                    status: n.metadata.get_str("status").unwrap_or("draft").to_string(),
                    title: n.title,
                    word_count,
                    last_update: n.modified,
                    folder_path: n.file_path,
                }
            })
            .collect())
    }

    fn folder_listing(&self, folder: &str) -> Result<Vec<NoteSummary>, ServiceError> {
        Ok(self.store.list_notes(&ListOptions {
            folder: Some(folder.to_string()),
            limit: Some(FOLDER_LISTING_LIMIT),
            ..Default::default()
        })?)
    }
}

/// Whether the note's `created` timestamp falls in the filter's window.
/// Notes without a parseable `created` never match.
fn created_in(note: &NoteSummary, filter: TimelineFilter) -> bool {
    let Some(created) = note.created.as_deref().and_then(parse_timestamp) else {
        return false;
    };

    let now = now_local();
    match filter {
        TimelineFilter::Today => same_local_day(created, now, now.offset()),
        TimelineFilter::Week => created >= now - Duration::days(7),
        TimelineFilter::Month => created >= now - Duration::days(30),
    }
}

#[cfg(test)]
mod tests;
