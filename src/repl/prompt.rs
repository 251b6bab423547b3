//! Prompt Detection Logic
//!
//! Recognises the child's prompt at the end of accumulated output. Matching
//! is done on raw bytes so chunks that split a UTF-8 sequence are harmless.

use crate::error::Result;
use regex::bytes::Regex;

/// Matches a prompt anchored at the very end of a buffer
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    /// The literal prompt text, for diagnostics
    literal: String,
    /// Anchored pattern
    pattern: Regex,
    /// How many trailing bytes need to be inspected
    window: usize,
}

impl PromptMatcher {
    /// Build a matcher for a literal prompt string
    pub fn literal(prompt: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"{}\z", regex::escape(prompt)))?;
        Ok(Self {
            literal: prompt.to_string(),
            pattern,
            window: prompt.len(),
        })
    }

    /// The prompt text this matcher looks for
    pub fn prompt(&self) -> &str {
        &self.literal
    }

    /// Whether `buffer` currently ends with the prompt
    pub fn matches_tail(&self, buffer: &[u8]) -> bool {
        if buffer.len() < self.window {
            return false;
        }
        self.pattern.is_match(&buffer[buffer.len() - self.window..])
    }

    /// Remove a trailing prompt from captured text, if present
    pub fn strip_from<'a>(&self, text: &'a str) -> &'a str {
        text.strip_suffix(self.literal.as_str()).unwrap_or(text)
    }
}
