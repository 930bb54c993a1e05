//! Shutdown latch set from SIGINT/SIGTERM
//!
//! The signal handlers only store `true` into an atomic flag and push one byte
//! into a non-blocking socket pair. Everything else (closing sockets, removing
//! the log file) runs in normal control flow once the flag is observed.

use crate::{ReplayLogError, Result};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::unix::AsyncFd;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Signals that request a graceful shutdown
pub const TERMINATION_SIGNALS: [i32; 2] = [SIGINT, SIGTERM];

/// Process-wide shutdown request flag
///
/// Cloning is cheap; every clone observes and sets the same flag.
#[derive(Clone)]
pub struct ShutdownLatch {
    inner: Arc<LatchInner>,
}

struct LatchInner {
    flag: Arc<AtomicBool>,
    wake_rx: UnixStream,
    wake_tx: UnixStream,
}

impl ShutdownLatch {
    /// Create an unset latch with no signal handlers attached
    pub fn new() -> Result<Self> {
        let (wake_tx, wake_rx) = UnixStream::pair()
            .map_err(|e| ReplayLogError::Signal(format!("Failed to create wake socket: {}", e)))?;
        wake_tx
            .set_nonblocking(true)
            .and_then(|_| wake_rx.set_nonblocking(true))
            .map_err(|e| ReplayLogError::Signal(format!("Failed to configure wake socket: {}", e)))?;

        Ok(Self {
            inner: Arc::new(LatchInner {
                flag: Arc::new(AtomicBool::new(false)),
                wake_rx,
                wake_tx,
            }),
        })
    }

    /// Register SIGINT and SIGTERM so they set this latch
    pub fn install_signal_handlers(&self) -> Result<()> {
        for signal in TERMINATION_SIGNALS {
            // Flag first: the waker must never fire before the flag is visible.
            signal_hook::flag::register(signal, Arc::clone(&self.inner.flag)).map_err(|e| {
                ReplayLogError::Signal(format!("Failed to register handler for {}: {}", signal, e))
            })?;

            let wake = self.inner.wake_tx.try_clone().map_err(|e| {
                ReplayLogError::Signal(format!("Failed to clone wake socket: {}", e))
            })?;
            signal_hook::low_level::pipe::register(signal, wake).map_err(|e| {
                ReplayLogError::Signal(format!("Failed to register waker for {}: {}", signal, e))
            })?;
        }

        debug!("Termination signal handlers installed");
        Ok(())
    }

    /// Whether shutdown has been requested
    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown without a signal
    pub fn trigger(&self) {
        self.inner.flag.store(true, Ordering::SeqCst);
        let _ = (&self.inner.wake_tx).write(&[1]);
    }

    /// Async view of the latch. Must be called inside a tokio runtime.
    pub fn watch(&self) -> Result<ShutdownWatch> {
        let wake = self
            .inner
            .wake_rx
            .try_clone()
            .and_then(AsyncFd::new)
            .map_err(|e| ReplayLogError::Signal(format!("Failed to watch wake socket: {}", e)))?;

        Ok(ShutdownWatch {
            flag: Arc::clone(&self.inner.flag),
            wake,
        })
    }
}

/// Future-friendly handle that resolves once shutdown is requested
pub struct ShutdownWatch {
    flag: Arc<AtomicBool>,
    wake: AsyncFd<UnixStream>,
}

impl ShutdownWatch {
    /// Whether shutdown has been requested
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolve once the latch is set. Cancel-safe.
    pub async fn requested(&self) {
        loop {
            if self.is_set() {
                return;
            }

            match self.wake.readable().await {
                Ok(mut guard) => {
                    let mut drain = [0u8; 64];
                    let _ = guard.try_io(|inner| {
                        let mut stream = inner.get_ref();
                        stream.read(&mut drain)
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Shutdown waker failed, falling back to polling");
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_new_latch_is_unset() {
        let latch = ShutdownLatch::new().unwrap();
        assert!(!latch.is_set());
    }

    #[test]
    fn test_trigger_is_visible_through_clones() {
        let latch = ShutdownLatch::new().unwrap();
        let clone = latch.clone();
        clone.trigger();
        assert!(latch.is_set());
    }

    #[tokio::test]
    async fn test_requested_resolves_after_trigger() {
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let trigger = latch.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let result = timeout(Duration::from_secs(2), watch.requested()).await;
        assert!(result.is_ok());
        assert!(watch.is_set());
    }

    #[tokio::test]
    async fn test_requested_stays_pending_while_unset() {
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let result = timeout(Duration::from_millis(100), watch.requested()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_requested_returns_immediately_when_already_set() {
        let latch = ShutdownLatch::new().unwrap();
        latch.trigger();
        let watch = latch.watch().unwrap();

        let result = timeout(Duration::from_millis(100), watch.requested()).await;
        assert!(result.is_ok());
    }
}
