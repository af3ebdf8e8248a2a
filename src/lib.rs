//! Personal knowledge-management backend over a Markdown vault.
//!
//! Notes are plain Markdown files with YAML frontmatter, laid out in an
//! Obsidian-style folder tree. [`VaultStore`] reads and writes them;
//! [`KnowledgeService`] classifies free-form captures with a language model
//! and files them, and builds timeline and dashboard views.

pub mod config;
pub mod frontmatter;
pub mod health;
pub mod llm;
pub mod models;
pub mod service;
pub mod utils;
pub mod vault;

pub use config::{ConfigError, FolderLayout, VaultConfig};
pub use frontmatter::{FrontmatterError, Metadata};
pub use health::{HealthReport, HealthStatus};
pub use llm::{Assistant, LlmError};
pub use models::{
    Category, ChatMessage, Classification, DailyLog, ListOptions, NewNote, Note, NoteRef,
    NoteSummary, NoteUpdate, Role, SortBy, UpdateOutcome,
};
pub use service::{
    CaptureOutcome, CaptureRequest, ChatReply, ChatRequest, Dashboard, KnowledgeService,
    ServiceError, Timeline, TimelineFilter, TimelineQuery,
};
pub use vault::{VaultError, VaultStore};
