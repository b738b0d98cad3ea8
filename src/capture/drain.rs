//! The drain step.
//!
//! After a handler returns, whatever part of the request body it left unread
//! is pulled from the original stream so the capture holds the whole body.
//! A [`DrainPolicy`] optionally bounds how much is read and for how long.

use std::io::{self, Read};
use std::time::{Duration, Instant};

use thiserror::Error;

const CHUNK_SIZE: usize = 8 * 1024;

/// Limits applied while draining an unread request body.
///
/// The default is unbounded: the drain runs until the stream ends or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainPolicy {
    /// Stop after this many drained bytes.
    pub max_bytes: Option<u64>,
    /// Stop once this much time has passed since the drain started.
    pub timeout: Option<Duration>,
}

impl DrainPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How many more bytes may be drained after `drained` so far.
    pub(crate) fn remaining(&self, drained: u64) -> Option<u64> {
        self.max_bytes.map(|max| max.saturating_sub(drained))
    }
}

/// Why a drain stopped before the end of the body.
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("reading request body failed: {0}")]
    Io(#[from] io::Error),

    #[error("request body exceeded the drain limit of {limit} bytes")]
    LimitExceeded { limit: u64 },

    #[error("request body drain timed out after {0:?}")]
    TimedOut(Duration),
}

/// Read `reader` to the end, appending everything to `buf`.
///
/// Returns the number of bytes drained. On error, bytes read before the
/// failure stay in `buf`. The deadline is checked between reads, so a single
/// blocked read is only bounded by the host's own socket timeouts.
pub fn drain<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    policy: &DrainPolicy,
) -> Result<u64, DrainError> {
    let started = Instant::now();
    let mut chunk = [0u8; CHUNK_SIZE];
    let mut drained: u64 = 0;

    loop {
        if let Some(timeout) = policy.timeout {
            if started.elapsed() >= timeout {
                return Err(DrainError::TimedOut(timeout));
            }
        }

        let n = match reader.read(&mut chunk) {
            Ok(0) => return Ok(drained),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        if let Some(remaining) = policy.remaining(drained) {
            if n as u64 > remaining {
                buf.extend_from_slice(&chunk[..remaining as usize]);
                return Err(DrainError::LimitExceeded {
                    limit: policy.max_bytes.unwrap_or_default(),
                });
            }
        }

        buf.extend_from_slice(&chunk[..n]);
        drained += n as u64;
    }
}
