//! Command Model
//!
//! A cell's text together with how it has to be delivered to Topaz.

use serde::{Deserialize, Serialize};

use crate::commands;

/// Line that terminates a raw multi-line block
pub const SENTINEL: &str = "%";

/// How a cell's text reaches the child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Nothing to send; the cell succeeds immediately
    NoOp,
    /// The text is sent line by line, each line waited on
    Direct,
    /// Each line is sent raw, then the sentinel is waited on
    RawMultilineUntilSentinel,
    /// Never sent
    Rejected,
}

impl DeliveryMode {
    /// Whether any bytes of the cell will be written to the child
    pub fn reaches_child(self) -> bool {
        matches!(
            self,
            DeliveryMode::Direct | DeliveryMode::RawMultilineUntilSentinel
        )
    }
}

/// An immutable classified cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    mode: DeliveryMode,
}

impl Command {
    /// Classify `text`
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mode = commands::classify(&text);
        Self { text, mode }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    /// What to write and what to wait on, or `None` if nothing is sent
    pub fn delivery_plan(&self) -> Option<DeliveryPlan> {
        commands::plan_delivery(&self.text, self.mode)
    }
}

/// The exact writes one command turns into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryPlan {
    /// Lines written without waiting for a prompt
    pub raw_lines: Vec<String>,
    /// Lines written one at a time, each followed by a prompt-wait
    pub commands: Vec<String>,
}

impl DeliveryPlan {
    /// What the terminal echoes back ahead of each prompt-wait, without the
    /// final line terminator. The raw lines are echoed before the first
    /// command's reply.
    pub fn echoes(&self) -> Vec<String> {
        self.commands
            .iter()
            .enumerate()
            .map(|(index, command)| {
                if index == 0 && !self.raw_lines.is_empty() {
                    let mut lines = self.raw_lines.clone();
                    lines.push(command.clone());
                    lines.join("\r\n")
                } else {
                    command.clone()
                }
            })
            .collect()
    }

    /// Number of separate writes this plan performs
    pub fn write_count(&self) -> usize {
        self.raw_lines.len() + self.commands.len()
    }
}
