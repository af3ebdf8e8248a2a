use serde::{Deserialize, Serialize};

use crate::frontmatter::Metadata;

/// A note read back from the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Path relative to the vault root, as requested.
    pub file_path: String,
    /// Metadata `title`, or the file stem when absent.
    pub title: String,
    /// Free-text body below the frontmatter.
    pub body: String,
    /// Full frontmatter mapping.
    pub metadata: Metadata,
}

/// Confirmation returned after a note has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub success: bool,
    /// Path relative to the vault root.
    pub file_path: String,
    pub absolute_path: String,
    pub title: String,
    /// File name including the `.md` extension.
    pub filename: String,
}

/// One entry of a vault listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteSummary {
    pub file_path: String,
    pub title: String,
    /// First 200 characters of the body, trimmed, `...` appended when cut.
    pub preview: String,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub success: bool,
    pub file_path: String,
    pub message: String,
}

/// A date-keyed journal note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    /// `true` when the log was already on disk before this call.
    pub exists: bool,
    pub body: String,
    pub metadata: Metadata,
    pub file_path: String,
}

/// Input for [`VaultStore::create_note`](crate::VaultStore::create_note).
///
/// Build it with [`NewNote::builder`].
///
/// # Examples
///
/// ```
/// use kvault::{Metadata, NewNote};
///
/// let note = NewNote::builder()
///     .title("Ship the release")
///     .body("- [ ] tag v1.0")
///     .folder("01_Execution/Daily_Operations/Tasks")
///     .metadata(Metadata::new().with("type", "task"))
///     .build();
///
/// assert_eq!(note.title, "Ship the release");
/// assert!(note.filename.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNote {
    pub body: String,
    pub title: String,
    /// Target folder relative to the vault root; created if missing.
    pub folder: String,
    /// Extra frontmatter. `title`, `created` and `modified` are always set by
    /// the store and override any values given here.
    pub metadata: Metadata,
    /// File stem without `.md`. Derived from the date and title when `None`.
    pub filename: Option<String>,
}

impl NewNote {
    /// Starts building a new note.
    pub fn builder() -> NewNoteBuilder {
        NewNoteBuilder::default()
    }
}

/// Builder for [`NewNote`].
#[derive(Debug, Default)]
pub struct NewNoteBuilder {
    body: Option<String>,
    title: Option<String>,
    folder: Option<String>,
    metadata: Option<Metadata>,
    filename: Option<String>,
}

impl NewNoteBuilder {
    /// Sets the body text.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the target folder.
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Sets additional metadata.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Overrides the generated file stem.
    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Builds the `NewNote`; unset fields default to empty.
    pub fn build(self) -> NewNote {
        NewNote {
            body: self.body.unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            folder: self.folder.unwrap_or_default(),
            metadata: self.metadata.unwrap_or_default(),
            filename: self.filename,
        }
    }
}

/// Changes applied by [`VaultStore::update_note`](crate::VaultStore::update_note).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteUpdate {
    /// Replaces the body when set.
    pub body: Option<String>,
    /// Merged into the existing metadata when set; never replaces it.
    pub metadata: Option<Metadata>,
}

impl NoteUpdate {
    /// An update that only replaces the body.
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            metadata: None,
        }
    }

    /// An update that only merges metadata.
    pub fn metadata(metadata: Metadata) -> Self {
        Self {
            body: None,
            metadata: Some(metadata),
        }
    }
}

/// Field used to order a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest `modified` first.
    #[default]
    Modified,
    /// Newest `created` first.
    Created,
    /// Filesystem scan order.
    Unsorted,
}

impl SortBy {
    /// Parses a sort key; anything other than `modified` / `created` leaves
    /// the listing unsorted.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "modified" => Self::Modified,
            "created" => Self::Created,
            _ => Self::Unsorted,
        }
    }

    /// Metadata key this order reads, if any.
    pub fn key(self) -> Option<&'static str> {
        match self {
            Self::Modified => Some("modified"),
            Self::Created => Some("created"),
            Self::Unsorted => None,
        }
    }
}

impl std::fmt::Display for SortBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Modified => write!(f, "modified"),
            Self::Created => write!(f, "created"),
            Self::Unsorted => write!(f, "unsorted"),
        }
    }
}

/// Options for [`VaultStore::list_notes`](crate::VaultStore::list_notes).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Restrict the scan to this subtree; `None` scans the whole vault.
    pub folder: Option<String>,
    /// Truncate after sorting; `None` is unbounded.
    pub limit: Option<usize>,
    pub sort_by: SortBy,
}
