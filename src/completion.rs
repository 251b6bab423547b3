//! Tab completion
//!
//! Completes the token before the cursor by asking the child for candidates:
//! variable names when the token starts with `$`, commands, functions and
//! file names otherwise.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::{CompletionConfig, PREFIX_PLACEHOLDER};
use crate::error::Result;
use crate::output::strip_echo;
use crate::repl::ReplWrapper;

/// Marks a token as a variable reference
pub const VARIABLE_SIGIL: char = '$';

/// A `complete_reply` content dictionary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub matches: Vec<String>,
    pub cursor_start: usize,
    pub cursor_end: usize,
    pub metadata: Map<String, Value>,
    pub status: String,
}

impl CompletionReply {
    /// No candidates, replacing nothing
    pub fn empty(cursor_pos: usize) -> Self {
        Self {
            matches: Vec::new(),
            cursor_start: 0,
            cursor_end: cursor_pos,
            metadata: Map::new(),
            status: "ok".to_string(),
        }
    }
}

/// What kind of names the token asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Variable,
    Command,
}

/// The token to complete and where it sits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// The token as typed, sigil included
    pub token: String,
    pub kind: CompletionKind,
    /// Character offset where the token starts
    pub cursor_start: usize,
    /// Character offset of the cursor
    pub cursor_end: usize,
}

impl CompletionRequest {
    /// Find the token before `cursor_pos` (in characters). `None` when there
    /// is nothing to complete.
    pub fn parse(code: &str, cursor_pos: usize) -> Option<Self> {
        let before: String = code.chars().take(cursor_pos).collect();
        let is_delimiter = |c: char| c.is_whitespace() || c == ';';
        if before.is_empty() || before.ends_with(is_delimiter) {
            return None;
        }

        let token = before.rsplit(is_delimiter).next()?.to_string();

        let cursor_end = before.chars().count();
        let kind = if token.starts_with(VARIABLE_SIGIL) {
            CompletionKind::Variable
        } else {
            CompletionKind::Command
        };

        Some(Self {
            cursor_start: cursor_end - token.chars().count(),
            cursor_end,
            kind,
            token,
        })
    }

    /// The token without its sigil
    pub fn prefix(&self) -> &str {
        match self.kind {
            CompletionKind::Variable => self.token.trim_start_matches(VARIABLE_SIGIL),
            CompletionKind::Command => &self.token,
        }
    }
}

/// Builds completion queries and interprets their output
#[derive(Debug, Clone)]
pub struct CompletionProvider {
    variable_query: String,
    command_query: String,
}

impl CompletionProvider {
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            variable_query: config.variable_query.clone(),
            command_query: config.command_query.clone(),
        }
    }

    /// The command sent to the child for `request`
    pub fn query_for(&self, request: &CompletionRequest) -> String {
        let template = match request.kind {
            CompletionKind::Variable => &self.variable_query,
            CompletionKind::Command => &self.command_query,
        };
        template.replace(PREFIX_PLACEHOLDER, request.prefix())
    }

    /// Turn the child's answer into a sorted, prefix-filtered reply
    pub fn candidates(&self, request: &CompletionRequest, output: &str) -> CompletionReply {
        let matches: BTreeSet<String> = output
            .split_whitespace()
            .map(|name| match request.kind {
                CompletionKind::Variable => format!("{}{}", VARIABLE_SIGIL, name),
                CompletionKind::Command => name.to_string(),
            })
            .filter(|candidate| candidate.starts_with(&request.token))
            .collect();

        if matches.is_empty() {
            return CompletionReply::empty(request.cursor_end);
        }

        CompletionReply {
            matches: matches.into_iter().collect(),
            cursor_start: request.cursor_start,
            cursor_end: request.cursor_end,
            metadata: Map::new(),
            status: "ok".to_string(),
        }
    }

    /// Ask the child for candidates
    pub async fn complete(
        &self,
        wrapper: &mut ReplWrapper,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionReply> {
        let query = self.query_for(request);
        let capture = wrapper.run_command(&query, Some(timeout)).await?;
        let body = strip_echo(wrapper.prompt().strip_from(&capture), &query);
        let reply = self.candidates(request, body);
        debug!(
            "Completion of {:?} produced {} candidates",
            request.token,
            reply.matches.len()
        );
        Ok(reply)
    }
}
