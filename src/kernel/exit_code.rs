//! Exit code detection
//!
//! Topaz has no universal way to report whether the last cell failed, so
//! detection is a pluggable capability. Without a probe every cell counts
//! as exit code 0.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::output::strip_echo;
use crate::repl::ReplWrapper;

/// Exit code reported when a probe cannot obtain one
pub const PROBE_FAILURE_EXIT_CODE: i32 = 1;

/// Asks the child for the outcome of the previous cell
#[async_trait]
pub trait ExitCodeProbe: Send + Sync {
    async fn exit_code(&self, wrapper: &mut ReplWrapper) -> Result<i32>;
}

/// Runs a query command and reads an integer from its output
#[derive(Debug, Clone)]
pub struct CommandExitCodeProbe {
    query: String,
    timeout: Duration,
}

impl CommandExitCodeProbe {
    pub fn new(query: impl Into<String>, timeout: Duration) -> Self {
        Self {
            query: query.into(),
            timeout,
        }
    }

    /// The integer in the query's output, echo and prompt removed
    pub fn parse(&self, body: &str) -> Result<i32> {
        let text = body.trim();
        text.parse::<i32>().map_err(|_| {
            Error::Other(format!(
                "exit code query {:?} answered {:?}",
                self.query, text
            ))
        })
    }
}

#[async_trait]
impl ExitCodeProbe for CommandExitCodeProbe {
    async fn exit_code(&self, wrapper: &mut ReplWrapper) -> Result<i32> {
        let capture = wrapper.run_command(&self.query, Some(self.timeout)).await?;
        let body = strip_echo(wrapper.prompt().strip_from(&capture), &self.query);
        self.parse(body)
    }
}

/// Run `probe`. A probe that answers badly counts as
/// [`PROBE_FAILURE_EXIT_CODE`]; a prompt-wait that did not end on the prompt
/// is returned so the caller can resynchronise the session.
pub async fn detect_exit_code(
    probe: Option<&dyn ExitCodeProbe>,
    wrapper: &mut ReplWrapper,
) -> Result<i32> {
    let Some(probe) = probe else {
        return Ok(0);
    };
    match probe.exit_code(wrapper).await {
        Ok(code) => Ok(code),
        Err(e) if e.leaves_session_out_of_step() => Err(e),
        Err(e) => {
            warn!("Exit code probe failed: {}", e);
            Ok(PROBE_FAILURE_EXIT_CODE)
        }
    }
}
