//! PTY Process Spawning
//!
//! Spawns the child on the slave side of a fresh pseudoterminal using
//! portable-pty and bridges the master side to async code.

use portable_pty::{native_pty_system, Child, CommandBuilder, PtyPair, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

use super::signals::SigintDispositionGuard;
use super::streams::PtyStreams;
use crate::error::{Error, Result};
use crate::models::PtyProcess;

/// Process spawning configuration
#[derive(Debug, Clone)]
pub struct SpawnConfig {
    /// Executable to run
    pub command: String,
    /// Arguments for the executable
    pub args: Vec<String>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Working directory
    pub working_directory: Option<PathBuf>,
    /// Terminal size
    pub size: PtySize,
}

impl SpawnConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            working_directory: None,
            size: PtySize {
                rows: 24,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}

/// A child running on a PTY, with its I/O bridged to channels
pub struct SpawnedPty {
    pub process: PtyProcess,
    pub streams: PtyStreams,
    pub child: Box<dyn Child + Send + Sync>,
}

/// Spawn a new PTY process
///
/// SIGINT is reset to its default disposition for the duration of the
/// spawn so the child starts out interruptible.
pub fn spawn_pty_process(config: &SpawnConfig) -> Result<SpawnedPty> {
    let pty_system = native_pty_system();

    let pair = pty_system
        .openpty(config.size)
        .map_err(|e| Error::PtyCreationFailed {
            command: config.command.clone(),
            reason: e.to_string(),
        })?;

    let mut cmd_builder = CommandBuilder::new(&config.command);
    cmd_builder.args(&config.args);

    for (key, value) in &config.env {
        cmd_builder.env(key, value);
    }

    if let Some(dir) = &config.working_directory {
        cmd_builder.cwd(dir);
    }

    let child = {
        let _sigint = SigintDispositionGuard::install_default()?;
        pair.slave
            .spawn_command(cmd_builder)
            .map_err(|e| Error::CommandSpawnFailed {
                command: config.command.clone(),
                reason: e.to_string(),
            })?
    };

    let pid = child.process_id();
    let mut process = PtyProcess::new(config.command.clone(), config.args.clone());
    process.mark_started(pid);
    info!("Spawned {} (pid {:?})", config.command, pid);

    let streams = create_pty_streams(pair)?;

    Ok(SpawnedPty {
        process,
        streams,
        child,
    })
}

/// Whether a read error means the slave side is gone for good
fn is_hangup(e: &std::io::Error) -> bool {
    #[cfg(unix)]
    {
        e.raw_os_error() == Some(nix::libc::EIO)
    }

    #[cfg(not(unix))]
    {
        e.kind() == std::io::ErrorKind::BrokenPipe
    }
}

/// Create PTY streams from a PTY pair
fn create_pty_streams(pair: PtyPair) -> Result<PtyStreams> {
    let PtyPair { master, slave } = pair;
    // Only the child may hold the slave open, or its exit never reaches us.
    drop(slave);

    let mut master_reader = master
        .try_clone_reader()
        .map_err(|e| Error::PtyReaderCloneFailed {
            reason: e.to_string(),
        })?;
    let mut master_writer = master.take_writer().map_err(|e| Error::PtyWriterTakeFailed {
        reason: e.to_string(),
    })?;

    // Channel: PTY output -> async consumer
    let (tx_async_out, rx_async_out) = unbounded_channel::<Vec<u8>>();
    // Channel: async producer (stdin) -> PTY writer thread
    let (tx_stdin, rx_stdin) = channel::<Vec<u8>>();

    thread::spawn(move || {
        // The master must outlive the reader on some platforms.
        let _master = master;
        let mut buf = [0u8; 4096];
        let mut consecutive_errors = 0;
        const MAX_CONSECUTIVE_ERRORS: u32 = 5;

        loop {
            match master_reader.read(&mut buf) {
                Ok(0) => {
                    debug!("PTY read EOF - process terminated");
                    break;
                }
                Ok(n) => {
                    consecutive_errors = 0;
                    if tx_async_out.send(buf[..n].to_vec()).is_err() {
                        debug!("PTY read: receiver dropped, stopping reader thread");
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) if is_hangup(&e) => {
                    debug!("PTY slave hung up - process terminated");
                    break;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!(
                        "PTY read error ({}): {} (attempt {}/{})",
                        e.kind(),
                        e,
                        consecutive_errors,
                        MAX_CONSECUTIVE_ERRORS
                    );

                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        error!("PTY read: too many consecutive errors, stopping reader thread");
                        break;
                    }

                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
        debug!("PTY reader thread exiting");
    });

    thread::spawn(move || {
        while let Ok(data) = rx_stdin.recv() {
            let written = master_writer
                .write_all(&data)
                .and_then(|()| master_writer.flush());
            if let Err(e) = written {
                warn!("PTY write error ({}): {}, stopping writer thread", e.kind(), e);
                return;
            }
        }
        debug!("PTY writer thread exiting");
    });

    Ok(PtyStreams::from_channels(rx_async_out, tx_stdin))
}

/// Check if a command is available on the system
pub fn is_command_available(command: &str) -> bool {
    let path = std::path::Path::new(command);
    if path.components().count() > 1 {
        return path.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()))
        .unwrap_or(false)
}
