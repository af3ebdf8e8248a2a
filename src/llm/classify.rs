//! Prompts and response parsing for capture classification.

use serde::Deserialize;

use crate::models::{Category, Classification};
use crate::utils::truncate_chars;

use super::client::LlmError;
use super::normalizer::TagNormalizer;

/// Characters of the input used as a title when the model gives none.
pub(crate) const FALLBACK_TITLE_CHARS: usize = 50;

/// System prompt for classification. The model is asked for a single JSON
/// object; the response is still parsed leniently.
pub(crate) const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are a knowledge-management assistant. Analyse the user's input and classify it.

Possible categories:
- work_log: work journal entries, completed tasks, progress updates
- idea: ideas, inspiration, creative thoughts
- task: to-dos, things that still need to be done
- reflection: reflections, reviews, retrospectives
- article: article drafts, longer writing
- project_update: progress on a specific project
- question: a question or query
- note: anything else

Return ONLY a JSON object with these fields:
{
  "category": "one of the categories above",
  "confidence": 0.95,
  "title": "a short title for this entry",
  "suggested_tags": ["tag1", "tag2"],
  "target_folder": "suggested storage folder",
  "summary": "one-sentence summary"
}"#;

/// System prompt for conversational replies. Vault context is appended.
pub(crate) const CHAT_SYSTEM_PROMPT: &str = r#"You are a friendly knowledge-management assistant helping the user manage their Obsidian vault.

You can:
- record and classify information
- answer questions about the vault's contents
- offer suggestions and insights
- help the user reflect and plan

Reply concisely and warmly. If the user wants to record something, confirm you understood what they meant."#;

/// Builds the user turn sent for classification.
pub(crate) fn classify_user_prompt(content: &str, context: Option<&serde_json::Value>) -> String {
    let mut prompt = format!("User input: {content}");
    if let Some(context) = context {
        prompt.push_str("\n\nContext: ");
        prompt.push_str(&context.to_string());
    }
    prompt
}

/// Builds the chat system prompt, with vault context when available.
pub(crate) fn chat_system_prompt(vault_context: Option<&str>) -> String {
    match vault_context {
        Some(context) if !context.trim().is_empty() => {
            format!("{CHAT_SYSTEM_PROMPT}\n\nRelevant vault content:\n{context}")
        }
        _ => CHAT_SYSTEM_PROMPT.to_string(),
    }
}

/// Extracts the outermost JSON object from a model reply.
///
/// Tolerates code fences and prose around the object by taking everything
/// from the first `{` to the last `}`.
///
/// # Examples
///
/// ```
/// use kvault::llm::extract_json;
///
/// let reply = "Sure!\n```json\n{\"category\": \"idea\"}\n```";
/// assert_eq!(extract_json(reply), Some("{\"category\": \"idea\"}"));
/// assert_eq!(extract_json("no json here"), None);
/// ```
pub fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

/// Classification fields as the model returns them. Everything is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawClassification {
    category: Option<String>,
    confidence: Option<serde_json::Value>,
    title: Option<String>,
    suggested_tags: Vec<serde_json::Value>,
    target_folder: Option<String>,
    summary: Option<String>,
}

/// Parses a model reply into a [`Classification`].
///
/// Missing fields get defaults: category `note`, confidence 0, and a title
/// taken from the first 50 characters of `content`. Confidence is clamped to
/// 0.0-1.0 (numeric strings are accepted) and tags are normalized.
///
/// # Errors
///
/// [`LlmError::Api`] when the reply contains no JSON object,
/// [`LlmError::Serialization`] when the object is malformed.
///
/// # Examples
///
/// ```
/// use kvault::Category;
/// use kvault::llm::parse_classification;
///
/// let reply = r#"{"category": "task", "confidence": 1.4, "suggested_tags": ["Home Office"]}"#;
/// let classification = parse_classification(reply, "Buy a desk lamp").unwrap();
///
/// assert_eq!(classification.category, Category::Task);
/// assert_eq!(classification.confidence, 1.0);
/// assert_eq!(classification.title, "Buy a desk lamp");
/// assert_eq!(classification.suggested_tags, vec!["home-office"]);
/// ```
pub fn parse_classification(reply: &str, content: &str) -> Result<Classification, LlmError> {
    let json = extract_json(reply).ok_or_else(|| LlmError::Api {
        message: "Classification reply contained no JSON object".to_string(),
    })?;
    let raw: RawClassification = serde_json::from_str(json).map_err(LlmError::Serialization)?;

    let category = raw
        .category
        .as_deref()
        .map(Category::parse)
        .unwrap_or(Category::Note);
    let confidence = raw.confidence.as_ref().and_then(as_confidence).unwrap_or(0.0);
    let title = raw
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| fallback_title(content));
    let tags = raw
        .suggested_tags
        .into_iter()
        .filter_map(|tag| match tag {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .collect();

    let mut classification = Classification::new(category, confidence, title)
        .with_tags(TagNormalizer::normalize_tags(tags));
    if let Some(folder) = raw.target_folder.filter(|f| !f.trim().is_empty()) {
        classification = classification.with_target_folder(folder);
    }
    if let Some(summary) = raw.summary.filter(|s| !s.trim().is_empty()) {
        classification = classification.with_summary(summary);
    }
    Ok(classification)
}

/// First 50 characters of the input, trimmed.
pub(crate) fn fallback_title(content: &str) -> String {
    truncate_chars(content.trim(), FALLBACK_TITLE_CHARS)
        .trim()
        .to_string()
}

fn as_confidence(value: &serde_json::Value) -> Option<f64> {
    let confidence: f64 = match value {
        serde_json::Value::Number(n) => n.as_f64()?,
        serde_json::Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    confidence.is_finite().then_some(confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_handles_clean_object() {
        assert_eq!(extract_json(r#"{"a": 1}"#), Some(r#"{"a": 1}"#));
    }

    #[test]
    fn extract_json_strips_code_fence_and_prose() {
        let reply = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nHope that helps.";
        assert_eq!(extract_json(reply), Some("{\"a\": {\"b\": 2}}"));
    }

    #[test]
    fn extract_json_rejects_reversed_braces() {
        assert_eq!(extract_json("} nothing {"), None);
        assert_eq!(extract_json(""), None);
    }

    #[test]
    fn parse_full_classification() {
        let reply = json!({
            "category": "project_update",
            "confidence": 0.82,
            "title": "Website redesign: nav done",
            "suggested_tags": ["Website", "Redesign", "website"],
            "target_folder": "01_Execution/Projects",
            "summary": "Navigation finished."
        })
        .to_string();

        let c = parse_classification(&reply, "ignored").unwrap();

        assert_eq!(c.category, Category::ProjectUpdate);
        assert!((c.confidence - 0.82).abs() < f64::EPSILON);
        assert_eq!(c.title, "Website redesign: nav done");
        assert_eq!(c.suggested_tags, vec!["website", "redesign"]);
        assert_eq!(c.target_folder.as_deref(), Some("01_Execution/Projects"));
        assert_eq!(c.summary.as_deref(), Some("Navigation finished."));
    }

    #[test]
    fn parse_defaults_missing_fields() {
        let c = parse_classification("{}", "  A thought about gardens  ").unwrap();

        assert_eq!(c.category, Category::Note);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.title, "A thought about gardens");
        assert!(c.suggested_tags.is_empty());
        assert_eq!(c.target_folder, None);
        assert_eq!(c.summary, None);
    }

    #[test]
    fn parse_maps_unknown_category_to_note() {
        let c = parse_classification(r#"{"category": "recipe"}"#, "x").unwrap();
        assert_eq!(c.category, Category::Note);
    }

    #[test]
    fn parse_clamps_and_coerces_confidence() {
        let c = parse_classification(r#"{"confidence": -3}"#, "x").unwrap();
        assert_eq!(c.confidence, 0.0);

        let c = parse_classification(r#"{"confidence": "0.4"}"#, "x").unwrap();
        assert!((c.confidence - 0.4).abs() < f64::EPSILON);

        let c = parse_classification(r#"{"confidence": "high"}"#, "x").unwrap();
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn parse_blank_title_uses_first_fifty_chars() {
        let content = "x".repeat(80);
        let c = parse_classification(r#"{"title": "   "}"#, &content).unwrap();
        assert_eq!(c.title, "x".repeat(50));
    }

    #[test]
    fn parse_skips_non_scalar_tags() {
        let c = parse_classification(r#"{"suggested_tags": ["ok", 2024, null, {"a": 1}]}"#, "x")
            .unwrap();
        assert_eq!(c.suggested_tags, vec!["ok", "2024"]);
    }

    #[test]
    fn parse_without_json_is_api_error() {
        let result = parse_classification("I think this is an idea.", "x");
        assert!(matches!(result, Err(LlmError::Api { .. })));
    }

    #[test]
    fn parse_malformed_json_is_serialization_error() {
        let result = parse_classification(r#"{"category": }"#, "x");
        assert!(matches!(result, Err(LlmError::Serialization(_))));
    }

    #[test]
    fn user_prompt_appends_context() {
        let prompt = classify_user_prompt("hello", Some(&json!({"timestamp": "now"})));
        assert!(prompt.starts_with("User input: hello"));
        assert!(prompt.contains(r#"Context: {"timestamp":"now"}"#));

        assert_eq!(classify_user_prompt("hello", None), "User input: hello");
    }

    #[test]
    fn chat_prompt_includes_context_only_when_present() {
        let with = chat_system_prompt(Some("Recent notes:\n- A"));
        assert!(with.ends_with("Relevant vault content:\nRecent notes:\n- A"));

        assert_eq!(chat_system_prompt(None), CHAT_SYSTEM_PROMPT);
        assert_eq!(chat_system_prompt(Some("  ")), CHAT_SYSTEM_PROMPT);
    }
}
