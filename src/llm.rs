//! Language-model client used to classify captures, answer chat messages and
//! transcribe voice notes.
//!
//! [`Assistant`] is the seam the rest of the crate depends on. [`OpenAiClient`]
//! implements it against any OpenAI-compatible HTTP API; tests substitute their
//! own implementations.
//!
//! # Examples
//!
//! ```no_run
//! use kvault::llm::{Assistant, OpenAiClientBuilder};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiClientBuilder::new()
//!     .api_key("sk-...")
//!     .model("gpt-4o-mini")
//!     .build()?;
//!
//! let classification = client.classify("Finished the quarterly report", None)?;
//! println!("{} ({:.2})", classification.category, classification.confidence);
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod normalizer;

pub use classify::{extract_json, parse_classification};
pub(crate) use classify::fallback_title;
pub use client::{
    Assistant, LlmError, OpenAiClient, OpenAiClientBuilder, UnconfiguredAssistant,
};
pub use normalizer::TagNormalizer;
