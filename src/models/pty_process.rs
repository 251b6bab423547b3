//! PTY Process Model
//!
//! Lifecycle bookkeeping for the Topaz child attached to a pseudoterminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents the state of a PTY process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PtyState {
    /// Process has been created but not started
    #[default]
    Created,
    /// Process is currently running
    Running,
    /// Process has closed its output stream or exited
    Terminated,
}

/// Lifecycle record of the child process
#[derive(Debug, Clone)]
pub struct PtyProcess {
    /// OS process identifier
    pub pid: Option<u32>,

    /// Current state of the process
    pub state: PtyState,

    /// When the process was started
    pub start_time: Option<DateTime<Utc>>,

    /// When the process terminated (if applicable)
    pub end_time: Option<DateTime<Utc>>,

    /// Exit code, when the child was reaped with one
    pub exit_code: Option<i32>,

    /// Command that was executed
    pub command: String,

    /// Arguments passed to the command
    pub args: Vec<String>,
}

impl PtyProcess {
    /// Create a new PTY process in the Created state
    pub fn new(command: String, args: Vec<String>) -> Self {
        Self {
            pid: None,
            state: PtyState::Created,
            start_time: None,
            end_time: None,
            exit_code: None,
            command,
            args,
        }
    }

    /// Mark the process as started with the given PID
    pub fn mark_started(&mut self, pid: Option<u32>) {
        self.pid = pid;
        self.state = PtyState::Running;
        self.start_time = Some(Utc::now());
    }

    /// Mark the process as terminated; repeated calls keep the first end time
    pub fn mark_terminated(&mut self, exit_code: Option<i32>) {
        if self.state != PtyState::Terminated {
            self.state = PtyState::Terminated;
            self.end_time = Some(Utc::now());
        }
        if exit_code.is_some() {
            self.exit_code = exit_code;
        }
    }

    /// Check if the process is currently running
    pub fn is_running(&self) -> bool {
        matches!(self.state, PtyState::Running)
    }

    /// Check if the process has terminated
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, PtyState::Terminated)
    }

    /// How long the process ran, once it has terminated
    pub fn execution_duration(&self) -> Option<std::time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).to_std().unwrap_or_default())
            }
            _ => None,
        }
    }

    /// Get a display string for the process
    pub fn display_string(&self) -> String {
        let state_str = match self.state {
            PtyState::Created => "Created",
            PtyState::Running => "Running",
            PtyState::Terminated => "Terminated",
        };

        let pid_str = self.pid.map_or("N/A".to_string(), |pid| pid.to_string());

        format!(
            "{} [{}] - {} {} {}",
            self.command,
            pid_str,
            state_str,
            self.args.join(" "),
            self.exit_code
                .map_or(String::new(), |code| format!("(exit: {})", code))
        )
    }
}

impl std::fmt::Display for PtyProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}
