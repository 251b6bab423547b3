//! Configuration management for the Topaz kernel
//!
//! This module describes how the Topaz child process is launched and logged
//! into, how long the kernel is willing to wait on it, and how image
//! markers and completion queries look. Configuration is read from TOML by
//! [`loader::ConfigLoader`]; every section falls back to defaults that
//! reproduce a stock Topaz installation.

pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure for the kernel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// How to launch and log into Topaz
    pub topaz: TopazConfig,

    /// PTY geometry
    pub pty: PtyConfig,

    /// Execution timing and user-facing notices
    pub execution: ExecutionConfig,

    /// Image marker handling
    pub images: ImageConfig,

    /// Completion queries sent to the child
    pub completion: CompletionConfig,
}

/// Child process launch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopazConfig {
    /// Executable to spawn
    pub executable: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Prompt printed before login
    pub initial_prompt: String,

    /// Text sent once the initial prompt appears (may span several lines)
    pub login_sequence: String,

    /// Prompt printed after every completed command once logged in
    pub steady_prompt: String,

    /// Extra environment variables for the child
    pub environment: HashMap<String, String>,

    /// Working directory for the child
    pub working_directory: Option<PathBuf>,

    /// How long to wait for the login prompts before giving up
    pub startup_timeout_ms: u64,

    /// Flag that makes the executable print its version banner
    pub version_flag: String,
}

impl Default for TopazConfig {
    fn default() -> Self {
        Self {
            executable: "topaz".to_string(),
            args: vec!["-il".to_string()],
            initial_prompt: "topaz> ".to_string(),
            login_sequence: "set user DataCurator pass swordfish gems gs64stone\nlogin".to_string(),
            steady_prompt: "topaz 1> ".to_string(),
            environment: HashMap::new(),
            working_directory: None,
            startup_timeout_ms: 30_000,
            version_flag: "-v".to_string(),
        }
    }
}

impl TopazConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// PTY-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtyConfig {
    /// Terminal rows
    pub rows: u16,

    /// Terminal columns
    pub cols: u16,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self { rows: 24, cols: 200 }
    }
}

/// Execution timing and notices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on a single cell; `None` waits indefinitely
    pub timeout_ms: Option<u64>,

    /// How long to wait for the prompt after forwarding an interrupt
    pub interrupt_recovery_timeout_ms: u64,

    /// How long a completion query may take
    pub completion_timeout_ms: u64,

    /// Appended to the output of a cell whose child died
    pub restart_notice: String,

    /// Streamed when a cell is refused
    pub rejection_message: String,

    /// Command whose output is the previous cell's exit code; unset means
    /// every cell counts as successful
    pub exit_code_command: Option<String>,

    /// How long `shutdown` waits after SIGTERM before killing the child
    pub shutdown_grace_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            interrupt_recovery_timeout_ms: 30_000,
            completion_timeout_ms: 5_000,
            restart_notice: "Restarting Topaz".to_string(),
            rejection_message: "Unauthorized command!".to_string(),
            exit_code_command: None,
            shutdown_grace_ms: 2_000,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn interrupt_recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.interrupt_recovery_timeout_ms)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_millis(self.completion_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// Image marker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Literal text that precedes an image file path in the child's output
    pub marker: String,

    /// Delete image files once they have been read
    pub remove_after_display: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            marker: "topaz_kernel: saved image data to: ".to_string(),
            remove_after_display: true,
        }
    }
}

/// Completion query templates; `{prefix}` is replaced by the token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Query for variable names (sigil already stripped)
    pub variable_query: String,

    /// Query for command, function and file names
    pub command_query: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            variable_query: "compgen -A arrayvar -A export -A variable {prefix}".to_string(),
            command_query: "compgen -cdfa {prefix}".to_string(),
        }
    }
}

/// Placeholder substituted in completion query templates
pub const PREFIX_PLACEHOLDER: &str = "{prefix}";

impl KernelConfig {
    /// Validate configuration values that would otherwise fail late
    pub fn validate(&self) -> Result<()> {
        fn require(field: &str, value: &str) -> Result<()> {
            if value.trim().is_empty() {
                return Err(Error::ConfigValidationFailed {
                    field: field.to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            Ok(())
        }

        require("topaz.executable", &self.topaz.executable)?;
        require("topaz.initial_prompt", &self.topaz.initial_prompt)?;
        require("topaz.steady_prompt", &self.topaz.steady_prompt)?;
        require("images.marker", &self.images.marker)?;

        if self.topaz.startup_timeout_ms == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "topaz.startup_timeout_ms".to_string(),
                reason: "startup must be bounded".to_string(),
            });
        }

        if self.pty.rows == 0 || self.pty.cols == 0 {
            return Err(Error::ConfigValidationFailed {
                field: "pty".to_string(),
                reason: format!("invalid size {}x{}", self.pty.cols, self.pty.rows),
            });
        }

        for (field, template) in [
            ("completion.variable_query", &self.completion.variable_query),
            ("completion.command_query", &self.completion.command_query),
        ] {
            if !template.contains(PREFIX_PLACEHOLDER) {
                return Err(Error::ConfigValidationFailed {
                    field: field.to_string(),
                    reason: format!("missing {} placeholder", PREFIX_PLACEHOLDER),
                });
            }
        }

        Ok(())
    }
}
