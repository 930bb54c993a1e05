//! ReplayLog server implementation

pub mod daemon;
pub mod listener;
pub mod session;
pub mod shutdown;
pub mod storage;

use crate::config::ServerConfig;
use crate::{ReplayLogError, Result};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

pub use daemon::{detach, Detached};
pub use listener::BoundSocket;
pub use session::{AbortReason, Session, SessionState};
pub use shutdown::{ShutdownLatch, ShutdownWatch};
pub use storage::LogStore;

/// Sequential accept loop over the shared log store
pub struct LogServer {
    config: ServerConfig,
    store: LogStore,
    latch: ShutdownLatch,
}

impl LogServer {
    /// Create a server that stops once `latch` is set
    pub fn new(config: ServerConfig, latch: ShutdownLatch) -> Self {
        let store = LogStore::new(&config);
        Self {
            config,
            store,
            latch,
        }
    }

    /// The log store sessions append to
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Serve connections on `listener` until shutdown is requested.
    ///
    /// The listener is closed and the log file removed on every return path.
    pub async fn run(self, listener: std::net::TcpListener) -> Result<()> {
        let outcome = self.serve(listener).await;
        self.cleanup();
        outcome
    }

    async fn serve(&self, listener: std::net::TcpListener) -> Result<()> {
        listener
            .set_nonblocking(true)
            .map_err(|e| ReplayLogError::Socket(format!("Failed to configure listener: {}", e)))?;
        let listener = TcpListener::from_std(listener)
            .map_err(|e| ReplayLogError::Socket(format!("Failed to register listener: {}", e)))?;
        let shutdown = self.latch.watch()?;

        match listener.local_addr() {
            Ok(addr) => info!("Server listening on port {}", addr.port()),
            Err(_) => info!("Server listening"),
        }

        while !shutdown.is_set() {
            let accepted = tokio::select! {
                biased;
                _ = shutdown.requested() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => self.serve_connection(stream, peer, &shutdown).await,
                Err(_) if shutdown.is_set() => break,
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }

        info!("Caught signal, exiting");
        Ok(())
    }

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr, shutdown: &ShutdownWatch) {
        let client_ip = peer.ip().to_canonical();
        info!("Accepted connection from {}", client_ip);

        let session = Session::new(stream, &self.store, shutdown, self.config.server.buffer_size);
        match session.run().await {
            SessionState::Aborted(AbortReason::PeerClosed) => info!("Client closed connection"),
            SessionState::Aborted(AbortReason::Shutdown) => {
                info!("Session aborted by shutdown request")
            }
            SessionState::Aborted(AbortReason::Failed(e)) => {
                warn!(error = %e, client = %client_ip, "Session failed")
            }
            state => debug!(?state, "Session finished"),
        }

        info!("Closed connection from {}", client_ip);
    }

    fn cleanup(&self) {
        match self.store.delete() {
            Ok(()) => {}
            Err(e) => debug!(error = %e, "Log store not removed"),
        }
    }
}
