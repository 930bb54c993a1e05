//! Per-connection receive/replay state machine

use crate::server::{LogStore, ShutdownWatch};
use crate::ReplayLogError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Byte that ends a client's transmission
pub const DELIMITER: u8 = b'\n';

/// Where a session is, or how it ended
#[derive(Debug)]
pub enum SessionState {
    /// Reading client bytes into the log until a delimiter shows up
    Receiving,
    /// Replaying the whole log to the client
    Sending,
    /// Replay finished
    Done,
    /// Ended without a complete replay
    Aborted(AbortReason),
}

/// Why a session was aborted
#[derive(Debug)]
pub enum AbortReason {
    /// Peer closed before sending a delimiter
    PeerClosed,
    /// Shutdown was requested while receiving
    Shutdown,
    /// Socket or log store failure
    Failed(ReplayLogError),
}

impl SessionState {
    /// `Done` or `Aborted`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Aborted(_))
    }
}

/// One accepted connection driven against the shared log
pub struct Session<'a, S> {
    stream: S,
    store: &'a LogStore,
    shutdown: &'a ShutdownWatch,
    buffer: Vec<u8>,
    received: u64,
}

impl<'a, S> Session<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a session reading at most `buffer_size` bytes per receive
    pub fn new(stream: S, store: &'a LogStore, shutdown: &'a ShutdownWatch, buffer_size: usize) -> Self {
        Self {
            stream,
            store,
            shutdown,
            buffer: vec![0u8; buffer_size.max(1)],
            received: 0,
        }
    }

    /// Drive the session to `Done` or `Aborted`. The stream is closed on return.
    pub async fn run(mut self) -> SessionState {
        let mut state = SessionState::Receiving;
        while !state.is_terminal() {
            state = match state {
                SessionState::Receiving => self.receive().await,
                SessionState::Sending => self.send().await,
                terminal => terminal,
            };
        }

        if let SessionState::Done = state {
            let _ = self.stream.shutdown().await;
        }
        state
    }

    async fn receive(&mut self) -> SessionState {
        let shutdown = self.shutdown;
        loop {
            if shutdown.is_set() {
                return SessionState::Aborted(AbortReason::Shutdown);
            }

            let read = tokio::select! {
                biased;
                _ = shutdown.requested() => return SessionState::Aborted(AbortReason::Shutdown),
                read = self.stream.read(&mut self.buffer) => read,
            };

            let n = match read {
                Ok(0) => return SessionState::Aborted(AbortReason::PeerClosed),
                Ok(n) => n,
                Err(e) => return SessionState::Aborted(AbortReason::Failed(e.into())),
            };

            // The whole chunk is logged even if bytes follow the delimiter.
            let chunk = &self.buffer[..n];
            if let Err(e) = self.store.append(chunk).await {
                return SessionState::Aborted(AbortReason::Failed(e));
            }
            self.received += n as u64;

            if chunk.contains(&DELIMITER) {
                debug!(bytes = self.received, "Delimiter received");
                return SessionState::Sending;
            }
        }
    }

    async fn send(&mut self) -> SessionState {
        match self.store.read_all(&mut self.stream).await {
            Ok(sent) => {
                debug!(bytes = sent, "Log replayed");
                SessionState::Done
            }
            Err(e) => SessionState::Aborted(AbortReason::Failed(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ShutdownLatch;
    use std::io;
    use tempfile::{tempdir, TempDir};
    use tokio::io::duplex;
    use tokio::time::{sleep, timeout, Duration};
    use tokio_test::io::Builder;

    fn store_in(dir: &TempDir) -> LogStore {
        LogStore::with_path(dir.path().join("data"), 1024)
    }

    #[tokio::test]
    async fn test_single_payload_is_logged_and_replayed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new().read(b"hello\n").write(b"hello\n").build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Done));
        assert_eq!(store.contents().await.unwrap(), b"hello\n");
    }

    #[tokio::test]
    async fn test_replay_includes_earlier_history() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.append(b"hello\n").await.unwrap();
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new().read(b"world\n").write(b"hello\nworld\n").build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Done));
    }

    #[tokio::test]
    async fn test_payload_split_across_reads() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new()
            .read(b"hel")
            .read(b"lo")
            .read(b"\n")
            .write(b"hello\n")
            .build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Done));
        assert_eq!(store.contents().await.unwrap(), b"hello\n");
    }

    #[tokio::test]
    async fn test_bytes_after_delimiter_are_kept() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new().read(b"one\ntwo").write(b"one\ntwo").build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Done));
        assert_eq!(store.contents().await.unwrap(), b"one\ntwo");
    }

    #[tokio::test]
    async fn test_small_buffer_still_replays_everything() {
        let dir = tempdir().unwrap();
        let store = LogStore::with_path(dir.path().join("data"), 4);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new()
            .read(b"abcd")
            .read(b"efgh")
            .read(b"ij\n")
            .write(b"abcdefghij\n")
            .build();
        let state = Session::new(stream, &store, &watch, 4).run().await;

        assert!(matches!(state, SessionState::Done));
    }

    #[tokio::test]
    async fn test_peer_close_without_delimiter_aborts_silently() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        // No write is scripted: any reply would fail the mock.
        let stream = Builder::new().read(b"partial").build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Aborted(AbortReason::PeerClosed)));
        assert_eq!(store.contents().await.unwrap(), b"partial");
    }

    #[tokio::test]
    async fn test_read_error_aborts() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new()
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Aborted(AbortReason::Failed(ReplayLogError::Io(_)))));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_write_error_during_replay_aborts_and_keeps_log() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new()
            .read(b"x\n")
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"))
            .build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Aborted(AbortReason::Failed(ReplayLogError::Io(_)))));
        assert_eq!(store.contents().await.unwrap(), b"x\n");
    }

    #[tokio::test]
    async fn test_unwritable_store_aborts() {
        let dir = tempdir().unwrap();
        let store = LogStore::with_path(dir.path().join("missing-dir").join("data"), 1024);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();

        let stream = Builder::new().read(b"hello\n").build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Aborted(AbortReason::Failed(ReplayLogError::Store(_)))));
    }

    #[tokio::test]
    async fn test_shutdown_before_first_read() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();
        latch.trigger();

        let stream = Builder::new().build();
        let state = Session::new(stream, &store, &watch, 1024).run().await;

        assert!(matches!(state, SessionState::Aborted(AbortReason::Shutdown)));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_blocked_receive() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let latch = ShutdownLatch::new().unwrap();
        let watch = latch.watch().unwrap();
        let (mut client, server) = duplex(64);

        client.write_all(b"no delimiter yet").await.unwrap();

        let trigger = latch.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.trigger();
        });

        let state = timeout(
            Duration::from_secs(2),
            Session::new(server, &store, &watch, 1024).run(),
        )
        .await
        .unwrap();
        assert!(matches!(state, SessionState::Aborted(AbortReason::Shutdown)));

        // Session dropped its end without replying.
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert!(reply.is_empty());
        assert_eq!(store.contents().await.unwrap(), b"no delimiter yet");
    }
}
