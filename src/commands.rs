//! Command classification
//!
//! Decides how a cell's text is delivered to Topaz. The policy is a small
//! ordered table of prefix sets; the first row whose prefixes match the
//! lowercased, trimmed text wins.

use crate::models::{DeliveryMode, DeliveryPlan, SENTINEL};

/// Administrative commands that would end or hijack the session
pub const REJECTED_PREFIXES: &[&str] = &["ed", "exi", "log", "pa", "q", "sh", "sp"];

/// Block statements whose body is terminated by a sentinel line
pub const BLOCK_PREFIXES: &[&str] = &["doi", "pr", "ru"];

/// `exec` takes a block only when it is not already a one-liner ending in `%`
pub const EXEC_PREFIXES: &[&str] = &["exe"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Reject,
    Block,
    Exec,
}

/// Evaluated top to bottom; rejection must come first so nothing rejected
/// is ever written to the child
const DECISION_TABLE: &[(&[&str], Rule)] = &[
    (REJECTED_PREFIXES, Rule::Reject),
    (BLOCK_PREFIXES, Rule::Block),
    (EXEC_PREFIXES, Rule::Exec),
];

/// Classify a cell. Depends on nothing but `text`.
pub fn classify(text: &str) -> DeliveryMode {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DeliveryMode::NoOp;
    }

    let lowered = trimmed.to_lowercase();
    let rule = DECISION_TABLE
        .iter()
        .find(|(prefixes, _)| prefixes.iter().any(|p| lowered.starts_with(p)))
        .map(|(_, rule)| *rule);

    match rule {
        Some(Rule::Reject) => DeliveryMode::Rejected,
        Some(Rule::Block) => DeliveryMode::RawMultilineUntilSentinel,
        Some(Rule::Exec) if exec_needs_block(trimmed) => DeliveryMode::RawMultilineUntilSentinel,
        _ => DeliveryMode::Direct,
    }
}

fn exec_needs_block(trimmed: &str) -> bool {
    trimmed.lines().count() > 1 || !trimmed.ends_with(SENTINEL)
}

/// Turn a classified cell into the writes that deliver it
pub fn plan_delivery(text: &str, mode: DeliveryMode) -> Option<DeliveryPlan> {
    match mode {
        DeliveryMode::NoOp | DeliveryMode::Rejected => None,
        DeliveryMode::Direct => Some(DeliveryPlan {
            raw_lines: Vec::new(),
            commands: text.trim().lines().map(str::to_string).collect(),
        }),
        DeliveryMode::RawMultilineUntilSentinel => {
            let mut raw_lines = block_lines(text.trim_start());
            if raw_lines.last().map(|line| line.trim()) == Some(SENTINEL) {
                raw_lines.pop();
            }
            Some(DeliveryPlan {
                raw_lines,
                commands: vec![SENTINEL.to_string()],
            })
        }
    }
}

/// Lines of a block as written, without blank lines trailing the body
fn block_lines(text: &str) -> Vec<String> {
    let lines: Vec<&str> = text.lines().collect();
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);
    lines[..end].iter().map(|line| line.to_string()).collect()
}
