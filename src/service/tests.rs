use std::fs;
use std::path::Path;
use std::sync::Mutex;

use serde_yaml::Value;
use tempfile::{TempDir, tempdir};
use time::Duration;

use super::*;
use crate::config::VaultConfig;
use crate::frontmatter;
use crate::models::{ChatMessage, NoteUpdate};
use crate::utils::format_timestamp;

/// Scripted assistant that records what it was asked.
#[derive(Default)]
struct MockAssistant {
    classification: Option<Classification>,
    chat_reply: Option<String>,
    transcript: Option<String>,
    classify_calls: Mutex<Vec<(String, Option<serde_json::Value>)>>,
    chat_contexts: Mutex<Vec<Option<String>>>,
}

impl MockAssistant {
    fn classifying(classification: Classification) -> Self {
        Self {
            classification: Some(classification),
            ..Default::default()
        }
    }

    fn failing() -> Self {
        Self::default()
    }
}

impl Assistant for MockAssistant {
    fn classify(
        &self,
        content: &str,
        context: Option<&serde_json::Value>,
    ) -> Result<Classification, LlmError> {
        self.classify_calls
            .lock()
            .unwrap()
            .push((content.to_string(), context.cloned()));
        self.classification.clone().ok_or(LlmError::Api {
            message: "model unavailable".to_string(),
        })
    }

    fn chat(
        &self,
        _message: &str,
        _history: &[ChatMessage],
        vault_context: Option<&str>,
    ) -> Result<String, LlmError> {
        self.chat_contexts
            .lock()
            .unwrap()
            .push(vault_context.map(str::to_string));
        self.chat_reply.clone().ok_or(LlmError::Http { status: 503 })
    }

    fn transcribe(&self, _audio: &[u8], _file_name: &str) -> Result<String, LlmError> {
        self.transcript.clone().ok_or(LlmError::Http { status: 400 })
    }
}

fn service_with(assistant: MockAssistant) -> (TempDir, KnowledgeService, Arc<MockAssistant>) {
    let dir = tempdir().expect("failed to create temp vault");
    let store = VaultStore::new(VaultConfig::new(dir.path()));
    let assistant = Arc::new(assistant);
    let service = KnowledgeService::new(store, assistant.clone());
    (dir, service, assistant)
}

fn write_raw(service: &KnowledgeService, relative: &str, metadata: &Metadata, body: &str) {
    let path = service.store().root().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, frontmatter::encode(metadata, body).unwrap()).unwrap();
}

fn stamped(title: &str, created: time::OffsetDateTime) -> Metadata {
    let ts = format_timestamp(created);
    Metadata::new()
        .with("title", title)
        .with("created", ts.as_str())
        .with("modified", ts)
}

// --- capture ---

#[test]
fn capture_rejects_blank_content() {
    let (_dir, service, assistant) = service_with(MockAssistant::failing());

    let result = service.capture(CaptureRequest::text("   \n\t"));

    assert!(matches!(result, Err(ServiceError::EmptyContent)));
    assert!(assistant.classify_calls.lock().unwrap().is_empty());
}

#[test]
fn capture_files_task_in_tasks_folder_with_metadata() {
    let classification = Classification::new(Category::Task, 0.92, "Renew passport")
        .with_tags(vec!["admin".to_string(), "travel".to_string()]);
    let (_dir, service, _) = service_with(MockAssistant::classifying(classification));

    let outcome = service
        .capture(CaptureRequest::voice("Need to renew my passport before June"))
        .expect("capture failed");

    assert!(outcome.success);
    assert!(outcome.classified);
    assert_eq!(outcome.message, "Saved to task");
    assert!(
        outcome
            .file_path
            .starts_with("01_Execution/Daily_Operations/Tasks/")
    );
    assert!(outcome.file_path.ends_with("_renew-passport.md"));

    let note = service.store().read_note(&outcome.file_path).unwrap();
    assert_eq!(note.body, "Need to renew my passport before June");
    assert_eq!(note.title, "Renew passport");
    assert_eq!(note.metadata.get_str("type"), Some("task"));
    assert_eq!(note.metadata.tags(), vec!["admin", "travel"]);
    assert_eq!(note.metadata.get_f64("ai_confidence"), Some(0.92));
    assert_eq!(note.metadata.get_str("input_type"), Some("voice"));
}

#[test]
fn capture_routes_every_category() {
    let cases = [
        (Category::WorkLog, "01_Execution/Daily_Operations/Logs/"),
        (Category::Idea, "01_Execution/Daily_Operations/Ideas/"),
        (Category::Task, "01_Execution/Daily_Operations/Tasks/"),
        (Category::ProjectUpdate, "01_Execution/Projects/"),
        (Category::Article, "01_Execution/Writing/"),
        (Category::Reflection, "01_Execution/Daily_Operations/Ideas/"),
        (Category::Question, "01_Execution/Daily_Operations/Ideas/"),
        (Category::Note, "01_Execution/Daily_Operations/Ideas/"),
    ];

    for (category, prefix) in cases {
        let classification = Classification::new(category, 0.8, format!("{category} entry"));
        let (_dir, service, _) = service_with(MockAssistant::classifying(classification));

        let outcome = service.capture(CaptureRequest::text("content")).unwrap();
        assert!(
            outcome.file_path.starts_with(prefix),
            "{category} should be filed under {prefix}, got {}",
            outcome.file_path
        );
    }
}

#[test]
fn capture_passes_timestamp_context_to_classifier() {
    let classification = Classification::new(Category::Idea, 0.7, "x");
    let (_dir, service, assistant) = service_with(MockAssistant::classifying(classification));

    service.capture(CaptureRequest::text("an idea")).unwrap();

    let calls = assistant.classify_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "an idea");
    let context = calls[0].1.as_ref().expect("context missing");
    let ts = context["timestamp"].as_str().expect("timestamp missing");
    assert!(parse_timestamp(ts).is_some());
}

#[test]
fn capture_falls_back_when_classification_fails() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    let content = "A fairly long thought about restructuring the garden beds next spring";

    let outcome = service
        .capture(CaptureRequest::text(content))
        .expect("capture should still succeed");

    assert!(outcome.success);
    assert!(!outcome.classified);
    assert_eq!(outcome.message, "Saved to note");
    assert_eq!(outcome.classification.category, Category::Note);
    assert_eq!(outcome.classification.confidence, 0.0);
    assert_eq!(outcome.classification.title, content.chars().take(50).collect::<String>().trim());
    assert!(outcome.classification.suggested_tags.is_empty());
    assert_eq!(
        outcome.classification.target_folder.as_deref(),
        Some("01_Execution/Daily_Operations/Ideas")
    );
    assert!(
        outcome
            .file_path
            .starts_with("01_Execution/Daily_Operations/Ideas/")
    );

    let note = service.store().read_note(&outcome.file_path).unwrap();
    assert_eq!(note.metadata.get_str("type"), Some("note"));
    assert_eq!(note.metadata.get_f64("ai_confidence"), Some(0.0));
    assert_eq!(note.body, content);
}

#[test]
fn capture_blank_model_title_uses_content_prefix() {
    let classification = Classification::new(Category::Idea, 0.9, "  ");
    let (_dir, service, _) = service_with(MockAssistant::classifying(classification));

    let outcome = service
        .capture(CaptureRequest::text("Short idea"))
        .unwrap();

    assert_eq!(outcome.classification.title, "Short idea");
    let note = service.store().read_note(&outcome.file_path).unwrap();
    assert_eq!(note.title, "Short idea");
}

#[test]
fn capture_caller_metadata_overrides_generated_fields() {
    let classification = Classification::new(Category::Idea, 0.9, "t")
        .with_tags(vec!["model-tag".to_string()]);
    let (_dir, service, _) = service_with(MockAssistant::classifying(classification));

    let request = CaptureRequest::text("content").with_metadata(
        Metadata::new()
            .with("tags", vec!["mine"])
            .with("source", "phone"),
    );
    let outcome = service.capture(request).unwrap();

    let note = service.store().read_note(&outcome.file_path).unwrap();
    assert_eq!(note.metadata.tags(), vec!["mine"]);
    assert_eq!(note.metadata.get_str("source"), Some("phone"));
    assert_eq!(note.metadata.get_str("type"), Some("idea"));
}

#[test]
fn capture_propagates_store_errors() {
    let dir = tempdir().unwrap();
    // A file where the vault root should be makes every write fail
    let root = dir.path().join("not-a-dir");
    fs::write(&root, "x").unwrap();
    let service = KnowledgeService::new(
        VaultStore::new(VaultConfig::new(&root)),
        Arc::new(MockAssistant::failing()),
    );

    let result = service.capture(CaptureRequest::text("content"));
    assert!(matches!(result, Err(ServiceError::Vault(_))));
}

// --- chat ---

#[test]
fn chat_returns_model_reply_with_recent_titles_as_context() {
    let (_dir, service, assistant) = service_with(MockAssistant {
        chat_reply: Some("Here is what I found".to_string()),
        ..Default::default()
    });
    let now = now_local();
    for i in 0..7 {
        write_raw(
            &service,
            &format!("Notes/n{i}.md"),
            &stamped(&format!("Note {i}"), now - Duration::minutes(i)),
            "body",
        );
    }

    let reply = service.chat(&ChatRequest::new("what did I write?"));

    assert_eq!(reply.response, "Here is what I found");
    let contexts = assistant.chat_contexts.lock().unwrap();
    let context = contexts[0].as_deref().expect("context should be sent");
    assert_eq!(
        context,
        "Recent notes:\n- Note 0\n- Note 1\n- Note 2\n- Note 3\n- Note 4"
    );
}

#[test]
fn chat_without_context_sends_none() {
    let (_dir, service, assistant) = service_with(MockAssistant {
        chat_reply: Some("ok".to_string()),
        ..Default::default()
    });

    service.chat(&ChatRequest::new("hi").without_context());

    assert_eq!(*assistant.chat_contexts.lock().unwrap(), vec![None]);
}

#[test]
fn chat_continues_when_context_listing_fails() {
    let dir = tempdir().unwrap();
    let assistant = Arc::new(MockAssistant {
        chat_reply: Some("still here".to_string()),
        ..Default::default()
    });
    let service = KnowledgeService::new(
        VaultStore::new(VaultConfig::new(dir.path().join("missing"))),
        assistant.clone(),
    );

    let reply = service.chat(&ChatRequest::new("hello"));

    assert_eq!(reply.response, "still here");
    assert_eq!(*assistant.chat_contexts.lock().unwrap(), vec![None]);
}

#[test]
fn chat_failure_becomes_apology_text() {
    let (_dir, service, _) = service_with(MockAssistant::failing());

    let reply = service.chat(&ChatRequest::new("hello"));

    assert!(reply.response.starts_with("Sorry"));
    assert!(reply.response.contains("503"), "error text should be included");
}

// --- transcribe ---

#[test]
fn transcribe_returns_text() {
    let (_dir, service, _) = service_with(MockAssistant {
        transcript: Some("remember the milk".to_string()),
        ..Default::default()
    });

    assert_eq!(
        service.transcribe(b"RIFF....", "memo.wav").unwrap(),
        "remember the milk"
    );
}

#[test]
fn transcribe_propagates_failure() {
    let (_dir, service, _) = service_with(MockAssistant::failing());

    let result = service.transcribe(b"garbage", "memo.webm");
    assert!(matches!(
        result,
        Err(ServiceError::Transcription(LlmError::Http { status: 400 }))
    ));
}

// --- timeline ---

fn seed_timeline(service: &KnowledgeService) {
    let now = now_local();
    let entries = [
        ("today-a", now - Duration::minutes(1)),
        ("today-b", now - Duration::minutes(2)),
        ("three-days", now - Duration::days(3)),
        ("twenty-days", now - Duration::days(20)),
        ("ninety-days", now - Duration::days(90)),
    ];
    for (name, created) in entries {
        write_raw(service, &format!("Log/{name}.md"), &stamped(name, created), "");
    }
}

#[test]
fn timeline_without_filter_lists_newest_first() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);

    let timeline = service.timeline(&TimelineQuery::default()).unwrap();

    let titles: Vec<&str> = timeline.items.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["today-a", "today-b", "three-days", "twenty-days", "ninety-days"]
    );
    assert_eq!(timeline.total, 5);
    assert!(!timeline.has_more);
}

#[test]
fn timeline_limit_sets_has_more() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);

    let timeline = service
        .timeline(&TimelineQuery {
            limit: 2,
            ..Default::default()
        })
        .unwrap();

    assert_eq!(timeline.total, 2);
    assert!(timeline.has_more);

    let exact = service
        .timeline(&TimelineQuery {
            limit: 5,
            ..Default::default()
        })
        .unwrap();
    assert!(!exact.has_more);
}

#[test]
fn timeline_filters_by_window() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);

    let count = |filter| {
        service
            .timeline(&TimelineQuery {
                filter: Some(filter),
                ..Default::default()
            })
            .unwrap()
            .total
    };

    // Minutes-old entries can straddle midnight; both must still be within a week
    assert!(count(TimelineFilter::Today) >= 1);
    assert_eq!(count(TimelineFilter::Week), 3);
    assert_eq!(count(TimelineFilter::Month), 4);
}

#[test]
fn timeline_filtered_has_more_counts_only_matching_notes() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);

    let timeline = service
        .timeline(&TimelineQuery {
            limit: 3,
            filter: Some(TimelineFilter::Week),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(timeline.total, 3);
    assert!(!timeline.has_more, "only three notes are within the week");
}

#[test]
fn timeline_filter_skips_notes_without_created() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    write_raw(&service, "bare.md", &Metadata::new().with("title", "bare"), "");

    let timeline = service
        .timeline(&TimelineQuery {
            filter: Some(TimelineFilter::Month),
            ..Default::default()
        })
        .unwrap();
    assert!(timeline.items.is_empty());

    let unfiltered = service.timeline(&TimelineQuery::default()).unwrap();
    assert_eq!(unfiltered.total, 1);
}

#[test]
fn timeline_restricts_to_folder() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);
    write_raw(
        &service,
        "Other/elsewhere.md",
        &stamped("elsewhere", now_local()),
        "",
    );

    let timeline = service
        .timeline(&TimelineQuery {
            folder: Some("Other".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(timeline.total, 1);
    assert_eq!(timeline.items[0].title, "elsewhere");
}

// --- dashboard ---

fn project(service: &KnowledgeService, name: &str, status: Option<&str>, progress: Option<Value>) {
    let mut meta = stamped(name, now_local());
    if let Some(status) = status {
        meta.insert("status", status);
    }
    if let Some(progress) = progress {
        meta.insert("progress", progress);
    }
    write_raw(service, &format!("01_Execution/Projects/{name}.md"), &meta, "");
}

#[test]
fn dashboard_excludes_completed_projects_and_applies_defaults() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    project(&service, "alpha", None, None);
    project(&service, "beta", Some("paused"), Some(Value::from(40)));
    project(&service, "gamma", Some("completed"), Some(Value::from(100)));
    project(&service, "delta", None, Some(Value::from(250)));

    let dashboard = service.dashboard().unwrap();

    let mut names: Vec<&str> = dashboard
        .active_projects
        .iter()
        .map(|p| p.name.as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["alpha", "beta", "delta"]);
    assert_eq!(dashboard.stats.active_projects, 3);

    let find = |name: &str| {
        dashboard
            .active_projects
            .iter()
            .find(|p| p.name == name)
            .unwrap()
    };
    assert_eq!(find("alpha").status, "active");
    assert_eq!(find("alpha").progress, 0.0);
    assert_eq!(find("beta").status, "paused");
    assert_eq!(find("beta").progress, 40.0);
    assert_eq!(find("delta").progress, 100.0);
    assert!(find("alpha").folder_path.starts_with("01_Execution/Projects/"));
    assert!(find("alpha").last_update.is_some());
}

#[test]
fn dashboard_shows_at_most_five_projects_but_counts_all() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    for i in 0..8 {
        project(&service, &format!("p{i}"), None, None);
    }

    let dashboard = service.dashboard().unwrap();

    assert_eq!(dashboard.active_projects.len(), 5);
    assert_eq!(dashboard.stats.active_projects, 8);
}

#[test]
fn dashboard_counts_article_words_from_body() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    let mut meta = stamped("Essay", now_local());
    meta.insert("status", "in-progress");
    write_raw(
        &service,
        "01_Execution/Writing/essay.md",
        &meta,
        &"lorem ipsum ".repeat(150),
    );
    write_raw(
        &service,
        "01_Execution/Writing/stub.md",
        &stamped("Stub", now_local() - Duration::hours(1)),
        "three little words",
    );

    let dashboard = service.dashboard().unwrap();

    assert_eq!(dashboard.stats.active_articles, 2);
    let essay = &dashboard.active_articles[0];
    assert_eq!(essay.title, "Essay");
    assert_eq!(essay.word_count, 300);
    assert_eq!(essay.status, "in-progress");
    let stub = &dashboard.active_articles[1];
    assert_eq!(stub.word_count, 3);
    assert_eq!(stub.status, "draft");
}

#[test]
fn dashboard_creates_daily_log_and_counts_entries() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    seed_timeline(&service);

    let dashboard = service.dashboard().unwrap();

    assert!(!dashboard.daily_log.exists);
    assert!(
        service
            .store()
            .read_note(&dashboard.daily_log.file_path)
            .is_ok()
    );
    assert!(dashboard.stats.today_entries >= 1);
    assert_eq!(dashboard.stats.week_entries, 3);

    let again = service.dashboard().unwrap();
    assert!(again.daily_log.exists);
}

#[test]
fn dashboard_recent_items_are_ten_most_recently_modified() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    let now = now_local();
    for i in 0..12 {
        write_raw(
            &service,
            &format!("Bulk/n{i:02}.md"),
            &stamped(&format!("n{i:02}"), now - Duration::hours(i)),
            "",
        );
    }

    let dashboard = service.dashboard().unwrap();

    assert_eq!(dashboard.recent_items.len(), 10);
    assert_eq!(dashboard.recent_items[0].title, "n00");
    assert_eq!(dashboard.recent_items[9].title, "n09");
}

#[test]
fn dashboard_on_missing_root_is_an_error() {
    let dir = tempdir().unwrap();
    let service = KnowledgeService::new(
        VaultStore::new(VaultConfig::new(dir.path().join("missing"))),
        Arc::new(MockAssistant::failing()),
    );

    assert!(matches!(
        service.dashboard(),
        Err(ServiceError::Vault(VaultError::RootUnavailable(_)))
    ));
}

// --- folder listings and health ---

#[test]
fn projects_and_articles_list_their_folders() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    project(&service, "alpha", Some("completed"), None);
    write_raw(
        &service,
        "01_Execution/Writing/draft.md",
        &stamped("Draft", now_local()),
        "",
    );

    let projects = service.projects().unwrap();
    assert_eq!(projects.len(), 1, "listing includes completed projects");
    assert_eq!(projects[0].title, "alpha");

    let articles = service.articles().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].title, "Draft");
}

#[test]
fn projects_in_missing_folder_is_empty() {
    let (_dir, service, _) = service_with(MockAssistant::failing());
    assert!(service.projects().unwrap().is_empty());
}

#[test]
fn health_reports_vault_and_model_state() {
    let (dir, service, _) = service_with(MockAssistant::failing());

    let report = service.health();

    assert!(report.vault_accessible);
    assert!(report.llm_configured, "mock assistant counts as configured");
    assert_eq!(Path::new(&report.vault_path), dir.path());
}

#[test]
fn captured_note_can_be_updated_through_store() {
    let classification = Classification::new(Category::Idea, 0.9, "Draft idea");
    let (_dir, service, _) = service_with(MockAssistant::classifying(classification));
    let outcome = service.capture(CaptureRequest::text("v1")).unwrap();

    service
        .store()
        .update_note(&outcome.file_path, NoteUpdate::body("v2"))
        .unwrap();

    let note = service.store().read_note(&outcome.file_path).unwrap();
    assert_eq!(note.body, "v2");
    assert_eq!(note.metadata.get_str("type"), Some("idea"));
}
