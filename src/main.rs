use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kvault::llm::{LlmError, OpenAiClientBuilder, UnconfiguredAssistant};
use kvault::utils::parse_date;
use kvault::{
    Assistant, CaptureRequest, ChatMessage, ChatRequest, ConfigError, FolderLayout,
    KnowledgeService, ListOptions, Metadata, NoteUpdate, ServiceError, SortBy, TimelineFilter,
    TimelineQuery, VaultConfig, VaultError, VaultStore,
};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LIST_LIMIT: usize = 50;

/// kvault - capture, file and review notes in a Markdown vault
#[derive(Parser)]
#[command(name = "kvault")]
#[command(about = "AI-assisted capture and review for a Markdown knowledge vault")]
#[command(version)]
struct Cli {
    /// Vault root; overrides OBSIDIAN_VAULT_PATH
    #[arg(long, global = true, value_name = "PATH")]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Classify input and file it as a new note
    Capture {
        #[arg(value_name = "CONTENT")]
        content: String,

        /// Mark the input as transcribed speech
        #[arg(long)]
        voice: bool,

        /// Extra frontmatter as a JSON object
        #[arg(long, value_name = "JSON")]
        metadata: Option<String>,
    },
    /// Print a note
    Read {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Replace a note's body and/or merge metadata
    Update {
        #[arg(value_name = "PATH")]
        path: String,

        #[arg(long)]
        body: Option<String>,

        /// Metadata to merge, as a JSON object
        #[arg(long, value_name = "JSON")]
        metadata: Option<String>,
    },
    /// List notes, newest first
    List {
        #[arg(long)]
        folder: Option<String>,

        /// Maximum notes to return; 0 for no limit
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,

        /// modified, created, or anything else for scan order
        #[arg(long, default_value = "modified")]
        sort_by: String,
    },
    /// Show (and create if needed) a daily log
    Daily {
        /// YYYY-MM-DD; defaults to today
        #[arg(long)]
        date: Option<String>,
    },
    /// Notes newest first, optionally within a time window
    Timeline {
        #[arg(long)]
        folder: Option<String>,

        #[arg(long, default_value_t = kvault::service::DEFAULT_TIMELINE_LIMIT)]
        limit: usize,

        /// today, week or month
        #[arg(long)]
        filter: Option<TimelineFilter>,
    },
    /// Stats, today's log, active projects and articles
    Dashboard,
    /// Notes in the projects folder
    Projects,
    /// Notes in the writing folder
    Articles,
    /// Ask the assistant something about the vault
    Chat {
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// JSON file with earlier turns: [{"role": "user", "content": "..."}]
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,

        /// Do not send recent note titles
        #[arg(long)]
        no_context: bool,
    },
    /// Transcribe an audio file
    Transcribe {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Capture the transcript as a voice note
        #[arg(long)]
        capture: bool,
    },
    /// Check vault access and model configuration
    Health {
        /// Human-readable output instead of JSON
        #[arg(long)]
        text: bool,
    },
}

/// Malformed command-line input.
#[derive(Debug, Error)]
#[error("{0}")]
struct InvalidInput(String);

/// What a command produced.
enum Output {
    Json(serde_json::Value),
    Text(String),
}

impl Output {
    fn json(value: &impl Serialize) -> Result<Self> {
        Ok(Self::Json(
            serde_json::to_value(value).context("Failed to serialize output")?,
        ))
    }
}

fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = build_service(cli.vault.as_deref(), matches!(cli.command, Commands::Health { .. }))
        .and_then(|service| execute(&cli.command, &service))
        .and_then(print_output);

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad input: empty content, unknown notes, paths outside the
/// vault, missing configuration and malformed arguments.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<ServiceError>() {
            return matches!(
                e,
                ServiceError::EmptyContent
                    | ServiceError::Vault(VaultError::NotFound(_) | VaultError::PathEscape(_))
            );
        }
        if let Some(e) = cause.downcast_ref::<VaultError>() {
            return matches!(e, VaultError::NotFound(_) | VaultError::PathEscape(_));
        }
        cause.is::<ConfigError>() || cause.is::<InvalidInput>()
    })
}

/// Loads configuration and wires the store to a model client.
///
/// `tolerate_missing_root` lets `health` report on a vault that does not exist
/// instead of failing up front.
fn build_service(vault: Option<&Path>, tolerate_missing_root: bool) -> Result<KnowledgeService> {
    dotenvy::dotenv().ok();

    let config = match vault {
        Some(path) => VaultConfig::new(path).with_layout(FolderLayout::from_env()),
        None => match VaultConfig::from_env() {
            Ok(config) => config,
            Err(ConfigError::VaultNotFound(root)) if tolerate_missing_root => {
                VaultConfig::new(root).with_layout(FolderLayout::from_env())
            }
            Err(e) => return Err(e).context("Failed to load vault configuration"),
        },
    };

    Ok(KnowledgeService::new(
        VaultStore::new(config),
        build_assistant()?,
    ))
}

fn build_assistant() -> Result<Arc<dyn Assistant>> {
    match OpenAiClientBuilder::new().build() {
        Ok(client) => Ok(Arc::new(client)),
        Err(LlmError::MissingApiKey) => {
            warn!("OPENAI_API_KEY is not set; model features are disabled");
            Ok(Arc::new(UnconfiguredAssistant))
        }
        Err(e) => Err(e).context("Failed to create LLM client"),
    }
}

fn execute(command: &Commands, service: &KnowledgeService) -> Result<Output> {
    let store = service.store();
    match command {
        Commands::Capture {
            content,
            voice,
            metadata,
        } => {
            let mut request = if *voice {
                CaptureRequest::voice(content.as_str())
            } else {
                CaptureRequest::text(content.as_str())
            };
            if let Some(raw) = metadata {
                request = request.with_metadata(parse_metadata_arg(raw)?);
            }
            Output::json(&service.capture(request)?)
        }
        Commands::Read { path } => Output::json(&store.read_note(path)?),
        Commands::Update {
            path,
            body,
            metadata,
        } => {
            let update = NoteUpdate {
                body: body.clone(),
                metadata: metadata.as_deref().map(parse_metadata_arg).transpose()?,
            };
            Output::json(&store.update_note(path, update)?)
        }
        Commands::List {
            folder,
            limit,
            sort_by,
        } => {
            let options = ListOptions {
                folder: folder.clone(),
                limit: (*limit > 0).then_some(*limit),
                sort_by: SortBy::parse(sort_by),
            };
            Output::json(&store.list_notes(&options)?)
        }
        Commands::Daily { date } => {
            let date = date
                .as_deref()
                .map(|d| {
                    parse_date(d).map_err(|e| InvalidInput(format!("Invalid date '{d}': {e}")))
                })
                .transpose()?;
            Output::json(&store.get_daily_log(date)?)
        }
        Commands::Timeline {
            folder,
            limit,
            filter,
        } => {
            let query = TimelineQuery {
                folder: folder.clone(),
                limit: *limit,
                filter: *filter,
            };
            Output::json(&service.timeline(&query)?)
        }
        Commands::Dashboard => Output::json(&service.dashboard()?),
        Commands::Projects => Output::json(&service.projects()?),
        Commands::Articles => Output::json(&service.articles()?),
        Commands::Chat {
            message,
            history,
            no_context,
        } => {
            let mut request = ChatRequest::new(message.as_str());
            if let Some(path) = history {
                request = request.with_history(read_history(path)?);
            }
            if *no_context {
                request = request.without_context();
            }
            Output::json(&service.chat(&request))
        }
        Commands::Transcribe { file, capture } => {
            let audio = std::fs::read(file)
                .with_context(|| format!("Failed to read audio file {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "audio".to_string());

            let text = service.transcribe(&audio, &file_name)?;
            if *capture {
                Output::json(&service.capture(CaptureRequest::voice(text))?)
            } else {
                Output::json(&serde_json::json!({ "success": true, "text": text }))
            }
        }
        Commands::Health { text } => {
            let report = service.health();
            if *text {
                let mut out = Vec::new();
                kvault::health::print_report(&report, &mut out)
                    .context("Failed to render health report")?;
                Ok(Output::Text(String::from_utf8_lossy(&out).into_owned()))
            } else {
                Output::json(&report)
            }
        }
    }
}

fn print_output(output: Output) -> Result<()> {
    match output {
        Output::Json(value) => {
            let rendered =
                serde_json::to_string_pretty(&value).context("Failed to serialize output")?;
            println!("{rendered}");
        }
        Output::Text(text) => print!("{text}"),
    }
    Ok(())
}

/// Parses a `--metadata` argument, which must be a JSON object.
fn parse_metadata_arg(raw: &str) -> Result<Metadata> {
    let json: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| InvalidInput(format!("Metadata is not valid JSON: {e}")))?;
    Metadata::from_json(&json)
        .map_err(|e| InvalidInput(format!("Metadata must be a JSON object: {e}")).into())
}

fn read_history(path: &Path) -> Result<Vec<ChatMessage>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read chat history {}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| InvalidInput(format!("Chat history is not a list of messages: {e}")).into())
}
