//! PTY Streams
//!
//! Async-friendly access to the PTY master: a reader thread forwards output
//! chunks over a tokio channel and a writer thread drains a std channel into
//! the master. Chunk boundaries carry no meaning; callers accumulate.

use crate::error::{Error, Result};
use std::sync::mpsc::Sender as StdSender;
use tokio::sync::mpsc::UnboundedReceiver;

/// PTY I/O streams wrapper
pub struct PtyStreams {
    /// Receiver for output bytes from the PTY
    output_rx: UnboundedReceiver<Vec<u8>>,
    /// Sender for input bytes to the PTY
    input_tx: StdSender<Vec<u8>>,
    /// Traffic counters
    stats: StreamStats,
    /// Set once the reader thread has gone away
    closed: bool,
}

impl PtyStreams {
    /// Create new PTY streams from channels
    pub fn from_channels(
        output_rx: UnboundedReceiver<Vec<u8>>,
        input_tx: StdSender<Vec<u8>>,
    ) -> Self {
        Self {
            output_rx,
            input_tx,
            stats: StreamStats::default(),
            closed: false,
        }
    }

    /// Queue bytes for the PTY stdin
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.input_tx.send(data.to_vec()).map_err(|e| {
            self.stats.write_errors += 1;
            Error::PtyInputSendFailed {
                reason: e.to_string(),
            }
        })?;
        self.stats.bytes_written += data.len() as u64;
        self.stats.write_operations += 1;
        trace!("Queued {} bytes for PTY", data.len());
        Ok(())
    }

    /// Wait for the next output chunk; `None` once the child's stream has ended
    pub async fn read(&mut self) -> Option<Vec<u8>> {
        if self.closed {
            return None;
        }
        match self.output_rx.recv().await {
            Some(bytes) => {
                self.stats.bytes_read += bytes.len() as u64;
                self.stats.read_operations += 1;
                Some(bytes)
            }
            None => {
                debug!("PTY output channel closed");
                self.closed = true;
                None
            }
        }
    }

    /// Drain all pending output from the channel, returning it
    pub fn drain_output(&mut self) -> Vec<u8> {
        let mut drained = Vec::new();
        while let Ok(bytes) = self.output_rx.try_recv() {
            drained.extend_from_slice(&bytes);
        }
        self.stats.bytes_read += drained.len() as u64;
        drained
    }

    /// Whether the output stream has reached its end
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Traffic counters for this stream pair
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}

/// Stream statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Total bytes read
    pub bytes_read: u64,
    /// Total bytes written
    pub bytes_written: u64,
    /// Number of read operations
    pub read_operations: u64,
    /// Number of write operations
    pub write_operations: u64,
    /// Number of failed writes
    pub write_errors: u64,
}

impl StreamStats {
    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
