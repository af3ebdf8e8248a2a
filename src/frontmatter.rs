//! YAML frontmatter codec for Markdown notes.
//!
//! A note on disk is a delimited YAML header followed by a blank line and the
//! free-text body:
//!
//! ```text
//! ---
//! title: My note
//! tags:
//! - idea
//! ---
//!
//! Body text starts here.
//! ```
//!
//! [`decode`] and [`encode`] convert between that text and a
//! `(Metadata, body)` pair. Encoding is deterministic: metadata keys are written
//! in insertion order, so `decode(encode(m, b))` always yields `(m, b)` again.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use thiserror::Error;

/// Line that opens and closes the frontmatter block.
const DELIMITER: &str = "---";

/// Errors produced while decoding or encoding frontmatter.
#[derive(Debug, Error)]
pub enum FrontmatterError {
    /// The header was opened but no closing delimiter line was found.
    #[error("Frontmatter block is not terminated by a closing '---' line")]
    Unterminated,

    /// The header is not valid YAML.
    #[error("Invalid YAML in frontmatter: {0}")]
    InvalidYaml(#[source] serde_yaml::Error),

    /// The header parsed, but it is not a key/value mapping.
    #[error("Frontmatter must be a mapping, found {found}")]
    NotAMapping { found: &'static str },

    /// The metadata could not be rendered as YAML.
    #[error("Failed to serialize frontmatter: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// Ordered key/value metadata stored in a note's frontmatter.
///
/// Keys keep their insertion order. Overwriting an existing key keeps its
/// original position, so merges do not reshuffle a file's header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Mapping);

impl Metadata {
    /// Creates an empty metadata mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, convenient for literals.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvault::Metadata;
    ///
    /// let meta = Metadata::new().with("status", "draft").with("progress", 40);
    /// assert_eq!(meta.get_str("status"), Some("draft"));
    /// assert_eq!(meta.len(), 2);
    /// ```
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Converts a JSON object into metadata.
    ///
    /// Used for caller-supplied metadata arriving as JSON (CLI flags, request
    /// payloads). Anything other than an object is rejected.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, FrontmatterError> {
        match serde_yaml::to_value(json).map_err(FrontmatterError::Serialize)? {
            Value::Mapping(map) => Ok(Self(map)),
            other => Err(FrontmatterError::NotAMapping {
                found: value_kind(&other),
            }),
        }
    }

    /// Inserts a value, returning the previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(Value::String(key.into()), value.into())
    }

    /// Removes `key`, keeping the order of the remaining keys.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Returns the value under `key` as a float if it is numeric.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Merges `other` into `self`.
    ///
    /// Keys from `other` overwrite existing values in place; new keys are
    /// appended. Keys only present in `self` are left untouched.
    pub fn merge(&mut self, other: Metadata) {
        for (key, value) in other.0 {
            self.0.insert(key, value);
        }
    }

    /// Returns the `tags` list, or an empty list when absent.
    ///
    /// Numeric tags (a bare year, say) are rendered as strings.
    pub fn tags(&self) -> Vec<String> {
        self.get("tags")
            .and_then(Value::as_sequence)
            .map(|items| items.iter().filter_map(scalar_to_string).collect())
            .unwrap_or_default()
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.iter()
    }

    /// Borrows the underlying YAML mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }
}

impl From<Mapping> for Metadata {
    fn from(map: Mapping) -> Self {
        Self(map)
    }
}

/// Splits raw note text into its metadata and body.
///
/// Text that does not open with a `---` line has no header: the metadata is
/// empty and the whole text is the body.
///
/// # Errors
///
/// Fails when the header is opened but never closed, when it is not valid
/// YAML, or when it is YAML but not a mapping.
///
/// # Examples
///
/// ```
/// use kvault::frontmatter::decode;
///
/// let (meta, body) = decode("---\ntitle: Hello\n---\n\nWorld").unwrap();
/// assert_eq!(meta.get_str("title"), Some("Hello"));
/// assert_eq!(body, "World");
///
/// let (meta, body) = decode("just text").unwrap();
/// assert!(meta.is_empty());
/// assert_eq!(body, "just text");
/// ```
pub fn decode(raw: &str) -> Result<(Metadata, String), FrontmatterError> {
    let Some(header_and_body) = strip_opening(raw) else {
        return Ok((Metadata::new(), raw.to_string()));
    };

    let mut offset = 0;
    for line in header_and_body.split_inclusive('\n') {
        if trim_line_ending(line) == DELIMITER {
            let yaml = &header_and_body[..offset];
            let rest = &header_and_body[offset + line.len()..];
            // One blank separator line belongs to the format, not the body
            let body = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            return Ok((parse_header(yaml)?, body.to_string()));
        }
        offset += line.len();
    }

    Err(FrontmatterError::Unterminated)
}

/// Renders metadata and body as note text.
///
/// A header is always written, even for empty metadata, so a body that itself
/// starts with `---` is never mistaken for frontmatter on the next read.
///
/// # Errors
///
/// Fails only if a metadata value cannot be represented as YAML.
pub fn encode(metadata: &Metadata, body: &str) -> Result<String, FrontmatterError> {
    let mut yaml = serde_yaml::to_string(metadata.as_mapping()).map_err(FrontmatterError::Serialize)?;
    if !yaml.ends_with('\n') {
        yaml.push('\n');
    }

    let mut out = String::with_capacity(yaml.len() + body.len() + 10);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&yaml);
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body);
    Ok(out)
}

fn strip_opening(raw: &str) -> Option<&str> {
    raw.strip_prefix("---\n")
        .or_else(|| raw.strip_prefix("---\r\n"))
}

fn trim_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn parse_header(yaml: &str) -> Result<Metadata, FrontmatterError> {
    if yaml.trim().is_empty() {
        return Ok(Metadata::new());
    }

    match serde_yaml::from_str::<Value>(yaml).map_err(FrontmatterError::InvalidYaml)? {
        Value::Mapping(map) => Ok(Metadata(map)),
        Value::Null => Ok(Metadata::new()),
        other => Err(FrontmatterError::NotAMapping {
            found: value_kind(&other),
        }),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
