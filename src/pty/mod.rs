//! Pseudoterminal (PTY) Management
//!
//! Spawns the Topaz child on a pseudoterminal, bridges its I/O to async
//! code, and delivers signals to it.

pub mod process;
pub mod signals;
pub mod streams;

pub use process::{is_command_available, spawn_pty_process, SpawnConfig, SpawnedPty};
pub use signals::{send_signal, SigintDispositionGuard, Signal};
pub use streams::{PtyStreams, StreamStats};
