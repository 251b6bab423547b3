//! Topaz Kernel - a notebook kernel for the GemStone/S 64 Bit Topaz CLI
//!
//! This library runs `topaz` on a pseudoterminal and translates notebook
//! requests into Topaz input, and Topaz output back into notebook messages.
//!
//! ## Module Organization
//!
//! - [`kernel`] - The execution orchestrator ([`TopazKernel`]) and kernel info
//! - [`repl`] - Prompt-synchronised wrapper around the child process
//! - [`pty`] - PTY spawning, I/O streams, signals
//! - [`commands`] - Classification of cells into delivery modes
//! - [`output`] - Echo stripping, image markers, image payloads
//! - [`completion`] - Tab completion through the child
//! - [`messages`] - Outbound IOPub messages and the sink they go to
//! - [`config`] - TOML configuration and its loader
//! - [`models`] - Commands, execution results, process lifecycle
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use topaz_kernel::{init, IopubMessage, TopazKernel};
//!
//! # async fn run() -> topaz_kernel::Result<()> {
//! let config = init()?;
//! let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<IopubMessage>();
//! let mut kernel = TopazKernel::start(config, Arc::new(tx)).await?;
//!
//! let result = kernel.execute("status", false, true).await?;
//! while let Ok(message) = rx.try_recv() {
//!     println!("{:?}", message);
//! }
//! println!("{}", result.to_reply());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Orchestrator:** async, one cell at a time per session
//! - **PTY Reader Thread:** blocking reads from the master, forwarded over `tokio::mpsc`
//! - **PTY Writer Thread:** drains a channel into the master
//!
//! Interrupts arrive out of band through an [`InterruptHandle`] and cancel the
//! prompt-wait in flight.

#[macro_use]
extern crate tracing;

pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod kernel;
pub mod messages;
pub mod models;
pub mod output;
pub mod pty;
pub mod repl;

pub use completion::{CompletionProvider, CompletionReply};
pub use config::loader::ConfigLoader;
pub use config::KernelConfig;
pub use error::{Error, Result};
pub use kernel::{KernelInfo, TopazKernel};
pub use messages::{DisplayData, IopubMessage, IopubSink};
pub use models::{Command, DeliveryMode, ExecutionResult, ExecutionStatus};
pub use repl::{InterruptHandle, ReplWrapper};

/// The current version of the kernel from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration from the default locations, falling back to defaults
///
/// # Errors
///
/// Fails if a configuration file exists but is invalid.
pub fn init() -> Result<KernelConfig> {
    info!("Initializing {} v{}", NAME, VERSION);
    let config = ConfigLoader::load()?;
    check_executable(&config);
    Ok(config)
}

/// Load configuration from an explicit file
pub fn init_with_config(config_path: &std::path::Path) -> Result<KernelConfig> {
    info!(
        "Initializing {} v{} with config: {}",
        NAME,
        VERSION,
        config_path.display()
    );

    if !config_path.exists() {
        return Err(Error::ConfigLoadFailed {
            path: config_path.to_path_buf(),
            reason: "Configuration file does not exist".to_string(),
        });
    }

    let config = ConfigLoader::load_from_path(config_path)?;
    check_executable(&config);
    Ok(config)
}

fn check_executable(config: &KernelConfig) {
    if !pty::is_command_available(&config.topaz.executable) {
        warn!(
            "{} not found on PATH; starting the kernel will fail",
            config.topaz.executable
        );
    }
}
