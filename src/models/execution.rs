//! Execution Result Model
//!
//! The status record returned for every executed cell.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Outcome of one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// The cell ran (possibly after a restart)
    Ok,
    /// Rejected, interrupted or timed out
    Abort,
    /// A non-zero exit code was detected
    Error,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Ok => "ok",
            ExecutionStatus::Abort => "abort",
            ExecutionStatus::Error => "error",
        }
    }
}

/// Terminal record of one cell execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub execution_count: u64,
    /// Present only for `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_value: Option<String>,
}

impl ExecutionResult {
    pub fn ok(execution_count: u64) -> Self {
        Self {
            status: ExecutionStatus::Ok,
            execution_count,
            error_value: None,
        }
    }

    pub fn abort(execution_count: u64) -> Self {
        Self {
            status: ExecutionStatus::Abort,
            execution_count,
            error_value: None,
        }
    }

    pub fn error(execution_count: u64, error_value: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Error,
            execution_count,
            error_value: Some(error_value.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ExecutionStatus::Ok
    }

    /// Render as an `execute_reply` content dictionary
    pub fn to_reply(&self) -> Value {
        match self.status {
            ExecutionStatus::Error => json!({
                "status": self.status.as_str(),
                "execution_count": self.execution_count,
                "ename": "",
                "evalue": self.error_value.clone().unwrap_or_default(),
                "traceback": [],
            }),
            _ => json!({
                "status": self.status.as_str(),
                "execution_count": self.execution_count,
                "payload": [],
                "user_expressions": {},
            }),
        }
    }
}
