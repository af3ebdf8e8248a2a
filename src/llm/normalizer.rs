use std::collections::HashSet;

/// Post-processing for model-suggested tags.
///
/// Tags are normalized to lowercase kebab-case so notes captured on different
/// days with slightly different model output still share tags.
pub struct TagNormalizer;

impl TagNormalizer {
    /// Normalizes a single tag to lowercase kebab-case.
    ///
    /// Lowercases, turns whitespace and underscores into hyphens, drops every
    /// other character that is not alphanumeric, collapses runs of hyphens and
    /// trims hyphens from both ends. Non-ASCII letters are kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvault::llm::TagNormalizer;
    ///
    /// assert_eq!(TagNormalizer::normalize_tag("Machine Learning"), "machine-learning");
    /// assert_eq!(TagNormalizer::normalize_tag("#rust!"), "rust");
    /// assert_eq!(TagNormalizer::normalize_tag("work_log"), "work-log");
    /// assert_eq!(TagNormalizer::normalize_tag("  --读书--  "), "读书");
    /// ```
    #[must_use]
    pub fn normalize_tag(tag: &str) -> String {
        let normalized = tag
            .to_lowercase()
            .chars()
            .map(|c| if c.is_whitespace() || c == '_' { '-' } else { c })
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect::<String>();

        normalized
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Normalizes a list of tags, dropping empties and duplicates.
    ///
    /// The first occurrence of each tag keeps its position.
    ///
    /// # Examples
    ///
    /// ```
    /// use kvault::llm::TagNormalizer;
    ///
    /// let tags = vec!["Rust".to_string(), "rust".to_string(), "  ".to_string(), "CLI".to_string()];
    /// assert_eq!(TagNormalizer::normalize_tags(tags), vec!["rust", "cli"]);
    /// ```
    #[must_use]
    pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        tags.into_iter()
            .map(|tag| Self::normalize_tag(&tag))
            .filter(|tag| !tag.is_empty() && seen.insert(tag.clone()))
            .collect()
    }
}
