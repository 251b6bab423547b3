//! Core data models
//!
//! Classified commands, execution results and the lifecycle record of the
//! Topaz child process.

pub mod command;
pub mod execution;
pub mod pty_process;

pub use command::{Command, DeliveryMode, DeliveryPlan, SENTINEL};
pub use execution::{ExecutionResult, ExecutionStatus};
pub use pty_process::{PtyProcess, PtyState};
