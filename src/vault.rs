//! Markdown vault store.
//!
//! `VaultStore` performs create/read/update/list operations over a directory
//! tree of Markdown files with YAML frontmatter. Every path it accepts is
//! relative to the configured root, and paths that would resolve outside the
//! root are rejected.
//!
//! There is no locking: concurrent writers to the same note race and the last
//! write wins. Listings tolerate files disappearing mid-scan. The only
//! exclusive write is daily-log creation: two callers asking for the same
//! day's log cannot both create it, and neither sees a partial file.
//!
//! # Examples
//!
//! ```
//! use kvault::{ListOptions, NewNote, VaultConfig, VaultStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let dir = tempfile::tempdir()?;
//! let store = VaultStore::new(VaultConfig::new(dir.path()));
//!
//! let created = store.create_note(
//!     NewNote::builder()
//!         .title("First idea")
//!         .body("Write everything down.")
//!         .folder("Ideas")
//!         .build(),
//! )?;
//!
//! let note = store.read_note(&created.file_path)?;
//! assert_eq!(note.title, "First idea");
//!
//! let listing = store.list_notes(&ListOptions::default())?;
//! assert_eq!(listing.len(), 1);
//! # Ok(())
//! # }
//! ```

use std::ffi::OsStr;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use time::Date;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::VaultConfig;
use crate::frontmatter::{self, FrontmatterError, Metadata};
use crate::models::{
    DailyLog, ListOptions, NewNote, Note, NoteRef, NoteSummary, NoteUpdate, UpdateOutcome,
};
use crate::utils::{format_date, now_timestamp, today, truncate_chars};

/// Characters removed from titles before they become file names.
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of a sanitized title, in characters.
const MAX_FILENAME_CHARS: usize = 100;

/// Length of listing previews, in characters.
const PREVIEW_CHARS: usize = 200;

const NOTE_EXTENSION: &str = "md";

/// Errors returned by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No note exists at the requested path.
    #[error("Note not found: {0}")]
    NotFound(String),

    /// The note exists but its frontmatter is malformed.
    #[error("Failed to parse note {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: FrontmatterError,
    },

    /// Metadata could not be rendered back to YAML.
    #[error("Failed to encode note {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: FrontmatterError,
    },

    /// The path resolves outside the vault root.
    #[error("Path escapes the vault root: {0}")]
    PathEscape(String),

    /// An exclusive create found a file already in place.
    #[error("Note already exists: {0}")]
    AlreadyExists(String),

    /// The vault root itself is missing or not a directory.
    #[error("Vault root is not accessible: {}", .0.display())]
    RootUnavailable(PathBuf),

    /// Any other filesystem failure.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl VaultError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How a new note's file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    /// Create or truncate.
    Overwrite,
    /// Fail if the file already exists.
    CreateNew,
}

/// File-backed note store rooted at a vault directory.
#[derive(Debug, Clone)]
pub struct VaultStore {
    config: VaultConfig,
}

impl VaultStore {
    /// Creates a store over the configured vault root.
    ///
    /// Takes ownership of the configuration. Nothing is touched on disk until
    /// an operation runs.
    pub fn new(config: VaultConfig) -> Self {
        Self { config }
    }

    /// The configuration this store was built with.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        self.config.root()
    }

    /// Resolves a vault-relative path to an absolute one.
    ///
    /// The path is normalised lexically: `.` is dropped and `..` removes the
    /// previous component. Symlinks inside the vault may be used as long as
    /// they point back into it; the deepest existing part of the path is
    /// canonicalized and must stay under the canonical root.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::PathEscape`] for absolute paths, for paths
    /// whose `..` components climb above the root, and for paths that reach
    /// outside the root through a symlink.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, VaultError> {
        let absolute = self
            .root()
            .join(normalize_relative(Path::new(relative), relative)?);
        self.ensure_contained(&absolute, relative)?;
        Ok(absolute)
    }

    /// Fails when the deepest existing part of `absolute` canonicalizes to a
    /// location outside the canonical root.
    fn ensure_contained(&self, absolute: &Path, display: &str) -> Result<(), VaultError> {
        let Ok(root) = self.root().canonicalize() else {
            return Ok(());
        };
        let real = absolute
            .ancestors()
            .find(|p| p.exists())
            .and_then(|p| p.canonicalize().ok());
        match real {
            Some(real) if !real.starts_with(&root) => {
                Err(VaultError::PathEscape(display.to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Writes a new note and returns where it landed.
    ///
    /// The folder is created with its parents when missing. When no file name
    /// is given, `{YYYY-MM-DD}_{sanitized title}` is used. `title`, `created`
    /// and `modified` are always set here and override caller metadata; the
    /// two timestamps are identical. An existing file at the same path is
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Path escapes and filesystem failures are returned to the caller.
    pub fn create_note(&self, note: NewNote) -> Result<NoteRef, VaultError> {
        self.write_new_note(note, WriteMode::Overwrite)
            .map(|(note_ref, _)| note_ref)
    }

    /// Reads a note.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when there is no file at `path`,
    /// [`VaultError::Parse`] when its frontmatter is malformed.
    pub fn read_note(&self, path: &str) -> Result<Note, VaultError> {
        let absolute = self.resolve(path)?;
        if !absolute.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }

        let (metadata, body) = load(&absolute, path)?;
        let title = resolve_title(&metadata, &absolute);

        Ok(Note {
            file_path: path.to_string(),
            title,
            body,
            metadata,
        })
    }

    /// Updates a note's body and/or metadata.
    ///
    /// A given body replaces the stored one. Given metadata is merged: new
    /// keys are added, existing keys overwritten, untouched keys kept.
    /// `modified` is always bumped. `created` is never touched: a `created`
    /// key in the given metadata is ignored.
    ///
    /// # Errors
    ///
    /// [`VaultError::NotFound`] when the note does not exist.
    pub fn update_note(&self, path: &str, update: NoteUpdate) -> Result<UpdateOutcome, VaultError> {
        let absolute = self.resolve(path)?;
        if !absolute.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }

        let (mut metadata, mut body) = load(&absolute, path)?;

        if let Some(new_body) = update.body {
            body = new_body;
        }
        if let Some(mut changes) = update.metadata {
            changes.remove("created");
            metadata.merge(changes);
        }
        metadata.insert("modified", now_timestamp());

        let text = frontmatter::encode(&metadata, &body).map_err(|source| VaultError::Encode {
            path: path.to_string(),
            source,
        })?;
        fs::write(&absolute, text).map_err(|e| VaultError::io(&absolute, e))?;
        debug!(path, "Updated note");

        Ok(UpdateOutcome {
            success: true,
            file_path: path.to_string(),
            message: "Note updated successfully".to_string(),
        })
    }

    /// Lists notes under the vault root or a subtree of it.
    ///
    /// The whole subtree is scanned before sorting. Files that cannot be read
    /// or parsed are skipped with a warning. With [`SortBy::Modified`] or
    /// [`SortBy::Created`](crate::SortBy) the result is newest first, notes
    /// missing the field last. `limit` applies after sorting.
    ///
    /// A folder that does not exist yields an empty listing.
    ///
    /// # Errors
    ///
    /// [`VaultError::RootUnavailable`] when the vault root itself is missing,
    /// [`VaultError::PathEscape`] for a folder outside the root.
    ///
    /// [`SortBy::Modified`]: crate::SortBy::Modified
    pub fn list_notes(&self, options: &ListOptions) -> Result<Vec<NoteSummary>, VaultError> {
        if !self.root().is_dir() {
            return Err(VaultError::RootUnavailable(self.root().to_path_buf()));
        }

        let search_path = match options.folder.as_deref() {
            Some(folder) => self.resolve(folder)?,
            None => self.root().to_path_buf(),
        };
        if !search_path.exists() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        for entry in WalkDir::new(&search_path) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable vault entry");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some(OsStr::new(NOTE_EXTENSION)) {
                continue;
            }

            match self.summarize(path) {
                Ok(summary) => notes.push(summary),
                Err(err) => warn!(path = %path.display(), error = %err, "Skipping note"),
            }
        }

        if let Some(key) = options.sort_by.key() {
            notes.sort_by(|a, b| sort_value(b, key).cmp(sort_value(a, key)));
        }
        if let Some(limit) = options.limit {
            notes.truncate(limit);
        }

        Ok(notes)
    }

    /// Returns the daily log for `date` (today when `None`), creating it from
    /// the template when it does not exist yet.
    ///
    /// The log lives at `{journal}/{YYYY}/{YYYY-MM-DD}_daily_log.md`. Creation
    /// is exclusive, so when two callers race only one writes and the other
    /// reads the winner's file.
    ///
    /// # Errors
    ///
    /// Filesystem and parse failures are returned to the caller.
    pub fn get_daily_log(&self, date: Option<Date>) -> Result<DailyLog, VaultError> {
        let date = date.unwrap_or_else(today);
        let date_str = format_date(date);
        let year = date.year().to_string();

        let metadata = Metadata::new()
            .with("type", "daily_log")
            .with("date", date_str.as_str())
            .with("tags", vec!["daily-log".to_string(), year.clone()]);
        let body = daily_log_template(&date_str);

        let new_note = NewNote::builder()
            .title(format!("Daily Log - {date_str}"))
            .body(body.clone())
            .folder(format!("{}/{}", self.config.layout().journal, year))
            .filename(format!("{date_str}_daily_log"))
            .metadata(metadata)
            .build();

        match self.write_new_note(new_note, WriteMode::CreateNew) {
            Ok((note_ref, metadata)) => Ok(DailyLog {
                exists: false,
                body,
                metadata,
                file_path: note_ref.file_path,
            }),
            Err(VaultError::AlreadyExists(path)) => {
                let note = self.read_note(&path)?;
                Ok(DailyLog {
                    exists: true,
                    body: note.body,
                    metadata: note.metadata,
                    file_path: note.file_path,
                })
            }
            Err(err) => Err(err),
        }
    }

    fn write_new_note(
        &self,
        note: NewNote,
        mode: WriteMode,
    ) -> Result<(NoteRef, Metadata), VaultError> {
        let stem = note
            .filename
            .unwrap_or_else(|| format!("{}_{}", format_date(today()), sanitize_filename(&note.title)));
        let filename = format!("{stem}.{NOTE_EXTENSION}");

        let requested = Path::new(&note.folder).join(&filename);
        let display = requested.to_string_lossy().into_owned();
        let relative = normalize_relative(&requested, &display)?;
        let absolute = self.root().join(&relative);
        self.ensure_contained(&absolute, &display)?;
        let relative = vault_path_string(&relative);

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::io(parent, e))?;
        }

        let now = now_timestamp();
        let mut metadata = note.metadata;
        metadata.insert("title", note.title.as_str());
        metadata.insert("created", now.as_str());
        metadata.insert("modified", now);

        let text = frontmatter::encode(&metadata, &note.body).map_err(|source| VaultError::Encode {
            path: relative.clone(),
            source,
        })?;

        match write_file(&absolute, &text, mode) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(VaultError::AlreadyExists(relative));
            }
            Err(e) => return Err(VaultError::io(&absolute, e)),
        }
        debug!(path = %relative, "Wrote note");

        Ok((
            NoteRef {
                success: true,
                file_path: relative,
                absolute_path: absolute.to_string_lossy().into_owned(),
                title: note.title,
                filename,
            },
            metadata,
        ))
    }

    fn summarize(&self, path: &Path) -> Result<NoteSummary, VaultError> {
        let relative = path
            .strip_prefix(self.root())
            .map(vault_path_string)
            .unwrap_or_else(|_| path.to_string_lossy().into_owned());

        let (metadata, body) = load(path, &relative)?;

        Ok(NoteSummary {
            title: resolve_title(&metadata, path),
            preview: preview(&body),
            created: metadata.get_str("created").map(str::to_string),
            modified: metadata.get_str("modified").map(str::to_string),
            tags: metadata.tags(),
            file_path: relative,
            metadata,
        })
    }
}

/// Turns a note title into a safe file stem.
///
/// Strips `< > : " / \ | ? *`, truncates to 100 characters, trims, replaces
/// spaces with hyphens and lowercases.
///
/// # Examples
///
/// ```
/// use kvault::vault::sanitize_filename;
///
/// assert_eq!(sanitize_filename("My: Great/Idea?"), "my-greatidea");
/// assert_eq!(sanitize_filename("  Weekly Review  "), "weekly-review");
/// ```
pub fn sanitize_filename(title: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect();

    truncate_chars(&stripped, MAX_FILENAME_CHARS)
        .trim()
        .replace(' ', "-")
        .to_lowercase()
}

/// Body of a freshly created daily log.
pub fn daily_log_template(date: &str) -> String {
    format!(
        "# Daily Log - {date}\n\n## 🎯 Today's Focus\n\n## 📝 Work Log\n\n## 💭 Thoughts and Ideas\n\n## 📊 Summary\n"
    )
}

/// Builds a listing preview from a note body.
fn preview(body: &str) -> String {
    let mut preview = truncate_chars(body, PREVIEW_CHARS).trim().to_string();
    if body.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

fn resolve_title(metadata: &Metadata, path: &Path) -> String {
    metadata
        .get_str("title")
        .map(str::to_string)
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
}

fn sort_value<'a>(summary: &'a NoteSummary, key: &str) -> &'a str {
    let value = if key == "created" {
        &summary.created
    } else {
        &summary.modified
    };
    value.as_deref().unwrap_or("")
}

fn load(absolute: &Path, display: &str) -> Result<(Metadata, String), VaultError> {
    let raw = fs::read_to_string(absolute).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::NotFound(display.to_string()),
        _ => VaultError::io(absolute, e),
    })?;

    frontmatter::decode(&raw).map_err(|source| VaultError::Parse {
        path: display.to_string(),
        source,
    })
}

fn write_file(path: &Path, text: &str, mode: WriteMode) -> io::Result<()> {
    match mode {
        WriteMode::Overwrite => fs::write(path, text),
        WriteMode::CreateNew => {
            // Readers must never observe a half-written file, so the content is
            // staged next to the target and linked in with a single call that
            // fails if the target already exists.
            let staging = staging_path(path);
            let staged = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&staging)
                .and_then(|mut file| file.write_all(text.as_bytes()));
            let linked = staged.and_then(|()| fs::hard_link(&staging, path));
            let _ = fs::remove_file(&staging);
            linked
        }
    }
}

fn staging_path(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}-{n}.tmp", std::process::id()))
}

/// Lexically normalises a vault-relative path, rejecting anything that would
/// leave the root.
fn normalize_relative(path: &Path, display: &str) -> Result<PathBuf, VaultError> {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(VaultError::PathEscape(display.to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(VaultError::PathEscape(display.to_string()));
            }
        }
    }
    Ok(parts.iter().collect())
}

/// Renders a relative path with `/` separators on every platform.
fn vault_path_string(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
