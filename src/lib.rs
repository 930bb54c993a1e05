//! # ReplayLog - Shared Append-Only History over TCP
//!
//! ReplayLog is a small TCP service. Each client sends bytes until a newline,
//! the bytes are appended to a persistent log file, and the client receives the
//! entire accumulated log back before the connection is closed.
//!
//! ## Features
//!
//! - **Sequential sessions**: one client at a time, so the log needs no locking
//! - **Graceful shutdown**: SIGINT/SIGTERM set a latch that stops the accept loop
//!   and any blocked receive, then the log file is removed
//! - **Daemon mode**: optional detach after the port is bound
//! - **Syslog**: optional `syslog-backend` feature for daemonized deployments
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use replaylog::config::ServerConfig;
//! use replaylog::server::{listener, LogServer, ShutdownLatch};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let latch = ShutdownLatch::new()?;
//!     latch.install_signal_handlers()?;
//!
//!     let listener = listener::bind(&config.server)?.listen(config.server.backlog)?;
//!     let runtime = tokio::runtime::Builder::new_current_thread()
//!         .enable_all()
//!         .build()?;
//!     runtime.block_on(LogServer::new(config, latch).run(listener))?;
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use replaylog::client::ReplayClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ReplayClient::connect("127.0.0.1:9000").await?;
//!     let history = client.send(b"hello\n").await?;
//!     println!("{}", String::from_utf8_lossy(&history));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod logging;
pub mod server;
pub mod tools;

/// Common error types used throughout ReplayLog
pub mod error {
    use std::fmt;

    /// ReplayLog error types
    #[derive(Debug)]
    pub enum ReplayLogError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Configuration error
        Config(String),
        /// Installing the termination signal handlers failed
        Signal(String),
        /// The bind address could not be resolved
        Resolve(String),
        /// Socket creation, option, bind or listen failed
        Socket(String),
        /// A daemonization step failed
        Daemon(String),
        /// The persistent log store could not be read or written
        Store(String),
        /// An external command could not be run
        Command(String),
        /// Client connection error
        Connection(String),
    }

    impl ReplayLogError {
        /// Whether this error aborts the process before the accept loop starts
        pub fn is_startup_fatal(&self) -> bool {
            matches!(
                self,
                ReplayLogError::Config(_)
                    | ReplayLogError::Signal(_)
                    | ReplayLogError::Resolve(_)
                    | ReplayLogError::Socket(_)
                    | ReplayLogError::Daemon(_)
            )
        }
    }

    impl fmt::Display for ReplayLogError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                ReplayLogError::Io(e) => write!(f, "I/O error: {}", e),
                ReplayLogError::Config(e) => write!(f, "Configuration error: {}", e),
                ReplayLogError::Signal(e) => write!(f, "Signal error: {}", e),
                ReplayLogError::Resolve(e) => write!(f, "Address resolution error: {}", e),
                ReplayLogError::Socket(e) => write!(f, "Socket error: {}", e),
                ReplayLogError::Daemon(e) => write!(f, "Daemon error: {}", e),
                ReplayLogError::Store(e) => write!(f, "Log store error: {}", e),
                ReplayLogError::Command(e) => write!(f, "Command error: {}", e),
                ReplayLogError::Connection(e) => write!(f, "Connection error: {}", e),
            }
        }
    }

    impl std::error::Error for ReplayLogError {}

    impl From<std::io::Error> for ReplayLogError {
        fn from(err: std::io::Error) -> Self {
            ReplayLogError::Io(err)
        }
    }

    /// Result type alias for ReplayLog operations
    pub type Result<T> = std::result::Result<T, ReplayLogError>;
}

pub use error::{ReplayLogError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::ReplayClient;
    pub use crate::config::ServerConfig;
    pub use crate::server::{LogServer, LogStore, ShutdownLatch};
    pub use crate::{ReplayLogError, Result};
}
