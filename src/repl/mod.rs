//! Prompt-synchronised REPL wrapper
//!
//! Owns one child process attached to a PTY. Every command is written as a
//! line and the wrapper then reads until the steady-state prompt sits at the
//! end of everything received since. That is the only synchronisation
//! anchor: banners, partial lines and diagnostics in between are simply
//! accumulated.

pub mod prompt;

pub use prompt::PromptMatcher;

use portable_pty::{Child, PtySize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::models::PtyProcess;
use crate::pty::{send_signal, spawn_pty_process, PtyStreams, Signal, SpawnConfig, StreamStats};

/// Written after every command and raw line
pub const LINE_TERMINATOR: &str = "\n";

/// The terminal's default interrupt character (Ctrl+C)
pub const INTERRUPT_CHAR: u8 = 0x03;

/// Everything needed to bring a session up
#[derive(Debug, Clone)]
pub struct ReplSpec {
    pub spawn: SpawnConfig,
    pub initial_prompt: String,
    pub login_sequence: String,
    pub steady_prompt: String,
    pub startup_timeout: Duration,
}

impl ReplSpec {
    pub fn from_config(config: &KernelConfig) -> Self {
        let topaz = &config.topaz;
        let mut spawn = SpawnConfig::new(topaz.executable.clone(), topaz.args.clone());
        spawn.env = topaz.environment.clone();
        spawn.working_directory = topaz.working_directory.clone();
        spawn.size = PtySize {
            rows: config.pty.rows,
            cols: config.pty.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        Self {
            spawn,
            initial_prompt: topaz.initial_prompt.clone(),
            login_sequence: topaz.login_sequence.clone(),
            steady_prompt: topaz.steady_prompt.clone(),
            startup_timeout: topaz.startup_timeout(),
        }
    }
}

/// Requests cancellation of whatever prompt-wait is in flight.
///
/// Cheap to clone and safe to use from another task while a command runs.
/// Interrupts raised while no command is running are ignored.
#[derive(Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<u64>>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the current wait, if any
    pub fn interrupt(&self) {
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
        debug!("Interrupt requested");
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A running child synchronised on its prompt
pub struct ReplWrapper {
    process: PtyProcess,
    streams: PtyStreams,
    child: Box<dyn Child + Send + Sync>,
    prompt: PromptMatcher,
    interrupts: watch::Receiver<u64>,
}

impl ReplWrapper {
    /// Spawn the child, log in, and wait until the steady prompt appears
    pub async fn start(spec: &ReplSpec, interrupts: &InterruptHandle) -> Result<Self> {
        let initial = PromptMatcher::literal(&spec.initial_prompt)?;
        let steady = PromptMatcher::literal(&spec.steady_prompt)?;
        let spawned = spawn_pty_process(&spec.spawn)?;

        let mut wrapper = Self {
            process: spawned.process,
            streams: spawned.streams,
            child: spawned.child,
            prompt: steady,
            interrupts: interrupts.subscribe(),
        };

        let startup_failed = |stage: &str, e: Error| Error::StartupFailed {
            executable: spec.spawn.command.clone(),
            reason: format!("{}: {}", stage, e),
        };

        let banner = read_until_prompt(
            &mut wrapper.streams,
            &initial,
            Some(spec.startup_timeout),
            None,
        )
        .await
        .map_err(|e| startup_failed("waiting for initial prompt", e))?;
        trace!("Startup banner: {:?}", banner);

        wrapper
            .write_line(&spec.login_sequence)
            .map_err(|e| startup_failed("sending login sequence", e))?;
        wrapper
            .expect_prompt(Some(spec.startup_timeout))
            .await
            .map_err(|e| startup_failed("waiting for steady prompt", e))?;

        info!("Session ready on pid {:?}", wrapper.pid());
        Ok(wrapper)
    }

    /// Send one command and return everything up to and including the prompt.
    ///
    /// `text` is a single line; the child prompts once per line it reads.
    ///
    /// The wait can be cancelled through the [`InterruptHandle`], which
    /// surfaces as [`Error::Interrupted`]; the child is left as it was.
    pub async fn run_command(&mut self, text: &str, timeout: Option<Duration>) -> Result<String> {
        // Interrupts that arrived while idle do not apply to this command.
        self.interrupts.borrow_and_update();
        debug!("Running command: {:?}", text);
        self.write_line(text)?;

        let result = read_until_prompt(
            &mut self.streams,
            &self.prompt,
            timeout,
            Some(&mut self.interrupts),
        )
        .await;
        self.note_end_of_stream(&result);
        result
    }

    /// Write one line without waiting for a prompt
    pub fn send_raw_line(&mut self, text: &str) -> Result<()> {
        trace!("Raw line: {:?}", text);
        self.write_line(text)
    }

    /// Forward an interrupt to the child and resynchronise on its prompt.
    ///
    /// Returns whatever the child printed while settling.
    pub async fn interrupt(&mut self, timeout: Duration) -> Result<String> {
        info!("Interrupting child pid {:?}", self.pid());
        self.write_bytes(&[INTERRUPT_CHAR])?;
        let result = self.expect_prompt(Some(timeout)).await;
        if result.is_ok() {
            let stray = self.streams.drain_output();
            if !stray.is_empty() {
                trace!("Discarded {} bytes after interrupt", stray.len());
            }
        }
        result
    }

    /// Wait for the steady prompt without sending anything
    pub async fn expect_prompt(&mut self, timeout: Option<Duration>) -> Result<String> {
        let result = read_until_prompt(&mut self.streams, &self.prompt, timeout, None).await;
        self.note_end_of_stream(&result);
        result
    }

    /// Whether the child has closed its output stream
    pub fn terminated(&self) -> bool {
        self.streams.is_closed() || self.process.is_terminated()
    }

    /// Stop the child: SIGTERM, then SIGKILL once `grace` has passed
    pub async fn terminate(&mut self, grace: Duration) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            self.mark_terminated();
            return;
        }

        if let Err(e) = self.signal(Signal::Terminate) {
            debug!("SIGTERM failed: {}", e);
        }

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if matches!(self.child.try_wait(), Ok(Some(_))) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if !matches!(self.child.try_wait(), Ok(Some(_))) {
            warn!("Child did not exit within {:?}, killing it", grace);
            if let Err(e) = self.child.kill() {
                warn!("Failed to kill child: {}", e);
            }
        }
        self.mark_terminated();
    }

    /// Deliver `signal` to the child process itself
    pub fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self.pid().ok_or(Error::NoPidAvailable)?;
        send_signal(pid, signal)
    }

    /// OS process id of the child
    pub fn pid(&self) -> Option<u32> {
        self.process.pid
    }

    /// Lifecycle record of the child
    pub fn process(&self) -> &PtyProcess {
        &self.process
    }

    /// Steady-state prompt this wrapper synchronises on
    pub fn prompt(&self) -> &PromptMatcher {
        &self.prompt
    }

    /// Bytes and operations exchanged with the child so far
    pub fn stats(&self) -> &StreamStats {
        self.streams.stats()
    }

    fn write_line(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + LINE_TERMINATOR.len());
        line.push_str(text);
        line.push_str(LINE_TERMINATOR);
        self.write_bytes(line.as_bytes())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.terminated() {
            return Err(Error::EndOfStream {
                before: String::new(),
            });
        }
        match self.streams.write(data) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Write to child failed: {}", e);
                self.mark_terminated();
                Err(Error::EndOfStream {
                    before: String::new(),
                })
            }
        }
    }

    fn note_end_of_stream<T>(&mut self, result: &Result<T>) {
        if matches!(result, Err(Error::EndOfStream { .. })) {
            self.mark_terminated();
        }
    }

    fn mark_terminated(&mut self) {
        let exit_code = match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code() as i32),
            _ => None,
        };
        if !self.process.is_terminated() {
            info!("Child {} ended", self.process);
        }
        self.process.mark_terminated(exit_code);
    }
}

impl Drop for ReplWrapper {
    fn drop(&mut self) {
        if !matches!(self.child.try_wait(), Ok(Some(_))) {
            debug!("Killing child pid {:?} on drop", self.pid());
            let _ = self.child.kill();
            let _ = self.child.try_wait();
        }
    }
}

/// Read until `matcher` matches the tail of everything received.
///
/// The buffer is checked after every chunk, however the reads happen to be
/// split. Fails with `EndOfStream` if the child goes away, `Interrupted` if
/// `interrupts` fires, `PromptTimeout` once `timeout` has passed.
async fn read_until_prompt(
    streams: &mut PtyStreams,
    matcher: &PromptMatcher,
    timeout: Option<Duration>,
    mut interrupts: Option<&mut watch::Receiver<u64>>,
) -> Result<String> {
    let started = Instant::now();
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            chunk = streams.read() => match chunk {
                Some(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    if matcher.matches_tail(&buffer) {
                        trace!("Prompt {:?} matched after {} bytes", matcher.prompt(), buffer.len());
                        return Ok(String::from_utf8_lossy(&buffer).into_owned());
                    }
                }
                None => {
                    return Err(Error::EndOfStream {
                        before: String::from_utf8_lossy(&buffer).into_owned(),
                    });
                }
            },
            _ = interrupt_requested(interrupts.as_deref_mut()) => {
                return Err(Error::Interrupted {
                    partial: String::from_utf8_lossy(&buffer).into_owned(),
                });
            }
            _ = deadline_reached(deadline) => {
                return Err(Error::PromptTimeout {
                    prompt: matcher.prompt().to_string(),
                    waited: started.elapsed(),
                    partial: String::from_utf8_lossy(&buffer).into_owned(),
                });
            }
        }
    }
}

async fn interrupt_requested(interrupts: Option<&mut watch::Receiver<u64>>) {
    match interrupts {
        Some(rx) => {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

async fn deadline_reached(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
