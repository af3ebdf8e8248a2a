//! Vault configuration.
//!
//! The store never reads the environment itself: callers build a
//! [`VaultConfig`] (explicitly, or with [`VaultConfig::from_env`]) and hand it
//! to [`VaultStore::new`](crate::VaultStore::new).

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::utils::expand_home;

/// Environment variable holding the vault root.
pub const VAULT_PATH_VAR: &str = "OBSIDIAN_VAULT_PATH";

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Environment variable {0} is not set")]
    MissingVar(&'static str),

    /// The configured vault root does not exist.
    #[error("Vault path does not exist: {}", .0.display())]
    VaultNotFound(PathBuf),
}

/// Folder conventions used when routing captured notes.
///
/// All paths are relative to the vault root. The store itself does not
/// enforce this layout; the service layer uses it to place notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderLayout {
    pub daily_logs: String,
    pub ideas: String,
    pub tasks: String,
    pub projects: String,
    pub writing: String,
    /// Parent of the per-year daily journal folders.
    pub journal: String,
}

impl Default for FolderLayout {
    fn default() -> Self {
        Self {
            daily_logs: "01_Execution/Daily_Operations/Logs".to_string(),
            ideas: "01_Execution/Daily_Operations/Ideas".to_string(),
            tasks: "01_Execution/Daily_Operations/Tasks".to_string(),
            projects: "01_Execution/Projects".to_string(),
            writing: "01_Execution/Writing".to_string(),
            journal: "01_Execution/Logs/Journal_Entries".to_string(),
        }
    }
}

impl FolderLayout {
    /// Builds the default layout, overriding each folder from
    /// `KVAULT_<NAME>_PATH` when that variable is set.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let pick = |var: &str, default: String| std::env::var(var).unwrap_or(default);

        Self {
            daily_logs: pick("KVAULT_DAILY_LOGS_PATH", defaults.daily_logs),
            ideas: pick("KVAULT_IDEAS_PATH", defaults.ideas),
            tasks: pick("KVAULT_TASKS_PATH", defaults.tasks),
            projects: pick("KVAULT_PROJECTS_PATH", defaults.projects),
            writing: pick("KVAULT_WRITING_PATH", defaults.writing),
            journal: pick("KVAULT_JOURNAL_PATH", defaults.journal),
        }
    }
}

/// Everything the vault store needs to operate.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    root: PathBuf,
    layout: FolderLayout,
}

impl VaultConfig {
    /// Creates a configuration for `root` with the default folder layout.
    ///
    /// `~` is expanded; the path is not checked for existence.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: expand_home(root.as_ref()),
            layout: FolderLayout::default(),
        }
    }

    /// Replaces the folder layout.
    #[must_use]
    pub fn with_layout(mut self, layout: FolderLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Loads configuration from the environment.
    ///
    /// Reads a `.env` file first if one is present, then takes the root from
    /// `OBSIDIAN_VAULT_PATH` and folder overrides from `KVAULT_*_PATH`.
    ///
    /// # Errors
    ///
    /// Fails if the root variable is unset or the directory does not exist.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw = std::env::var(VAULT_PATH_VAR).map_err(|_| ConfigError::MissingVar(VAULT_PATH_VAR))?;
        let config = Self::new(raw).with_layout(FolderLayout::from_env());

        if !config.root.is_dir() {
            return Err(ConfigError::VaultNotFound(config.root));
        }

        Ok(config)
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The folder layout.
    pub fn layout(&self) -> &FolderLayout {
        &self.layout
    }
}
