//! PTY Signal Handling
//!
//! Sending signals to the Topaz child and shielding it from the host's own
//! SIGINT disposition while it is being spawned.

use crate::error::{Error, Result};

/// Signal types that can be sent to the child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Interrupt signal (Ctrl+C)
    Interrupt,
    /// Termination signal (graceful shutdown)
    Terminate,
    /// Kill signal (forceful termination)
    Kill,
    /// Hangup signal
    Hangup,
}

impl Signal {
    #[cfg(unix)]
    fn to_nix(self) -> nix::sys::signal::Signal {
        use nix::sys::signal::Signal as NixSignal;

        match self {
            Signal::Interrupt => NixSignal::SIGINT,
            Signal::Terminate => NixSignal::SIGTERM,
            Signal::Kill => NixSignal::SIGKILL,
            Signal::Hangup => NixSignal::SIGHUP,
        }
    }
}

/// Send a signal to a process by PID
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    debug!("Sending {:?} to pid {}", signal, pid);
    kill(Pid::from_raw(pid as i32), signal.to_nix()).map_err(|e| Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: e.to_string(),
    })
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, signal: Signal) -> Result<()> {
    Err(Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: format!("signals are not supported on {}", std::env::consts::OS),
    })
}

/// Resets the host's SIGINT disposition to the default for as long as it
/// lives, restoring the previous disposition when dropped.
///
/// A child inherits ignored signals across `exec`. Hosts that ignore SIGINT
/// outside their own handlers would otherwise hand the child an
/// uninterruptible SIGINT.
pub struct SigintDispositionGuard {
    #[cfg(unix)]
    previous: Option<nix::sys::signal::SigAction>,
}

impl SigintDispositionGuard {
    /// Install `SIG_DFL` for SIGINT, remembering what was there before
    #[cfg(unix)]
    pub fn install_default() -> Result<Self> {
        use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};

        let default = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
        // SAFETY: SIG_DFL is not a Rust handler, so no handler code can run
        // concurrently with the rest of the process because of this call.
        let previous = unsafe { sigaction(nix::sys::signal::Signal::SIGINT, &default) }
            .map_err(|e| Error::SignalDispositionFailed {
                signal: "SIGINT".to_string(),
                reason: e.to_string(),
            })?;
        trace!("SIGINT disposition reset to default");

        Ok(Self {
            previous: Some(previous),
        })
    }

    #[cfg(not(unix))]
    pub fn install_default() -> Result<Self> {
        Ok(Self {})
    }
}

impl Drop for SigintDispositionGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(previous) = self.previous.take() {
            // SAFETY: restores exactly the disposition that was installed
            // before this guard existed.
            match unsafe { nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGINT, &previous) } {
                Ok(_) => trace!("SIGINT disposition restored"),
                Err(e) => warn!("Failed to restore SIGINT disposition: {}", e),
            }
        }
    }
}
