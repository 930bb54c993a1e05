//! Tracing subscriber setup
//!
//! Events go to stderr in the foreground. With the `syslog-backend` feature
//! (on by default) a daemonized server logs to the local syslog daemon, the
//! only place its output remains visible once stdio points at `/dev/null`.

use crate::{ReplayLogError, Result};
use tracing_subscriber::EnvFilter;

/// Where formatted events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogBackend {
    /// Standard error
    Stderr,
    /// Local syslog, facility `LOG_USER`
    #[cfg(feature = "syslog-backend")]
    Syslog,
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "replaylog=debug,replaylog_server=debug,info"
        } else {
            "replaylog=info,replaylog_server=info,warn"
        })
    })
}

fn install_stderr(verbose: bool) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ReplayLogError::Config(format!("Failed to set tracing subscriber: {}", e)))
}

/// Backend for a process that may detach: syslog when asked for or when
/// daemonizing, stderr otherwise
#[cfg(feature = "syslog-backend")]
pub fn select_backend(syslog_requested: bool, daemonize: bool) -> LogBackend {
    if syslog_requested || daemonize {
        LogBackend::Syslog
    } else {
        LogBackend::Stderr
    }
}

/// Without syslog support every process logs to stderr
#[cfg(not(feature = "syslog-backend"))]
pub fn select_backend(_syslog_requested: bool, _daemonize: bool) -> LogBackend {
    LogBackend::Stderr
}

/// Install the global subscriber.
///
/// If the syslog socket is unreachable the subscriber falls back to stderr.
pub fn init(verbose: bool, backend: LogBackend) -> Result<()> {
    match backend {
        LogBackend::Stderr => install_stderr(verbose),
        #[cfg(feature = "syslog-backend")]
        LogBackend::Syslog => {
            let writer = match syslog_writer::SyslogMakeWriter::connect(env!("CARGO_PKG_NAME")) {
                Ok(writer) => writer,
                Err(e) => {
                    install_stderr(verbose)?;
                    tracing::warn!("{}, logging to stderr", e);
                    return Ok(());
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(env_filter(verbose))
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .without_time()
                .with_level(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|e| ReplayLogError::Config(format!("Failed to set tracing subscriber: {}", e)))
        }
    }
}


#[cfg(feature = "syslog-backend")]
mod syslog_writer {
    use crate::{ReplayLogError, Result};
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use syslog::{Facility, Formatter3164, Logger, LoggerBackend};
    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;

    type SysLogger = Logger<LoggerBackend, Formatter3164>;

    /// Hands out one buffered line writer per event
    #[derive(Clone)]
    pub struct SyslogMakeWriter {
        logger: Arc<Mutex<SysLogger>>,
    }

    impl SyslogMakeWriter {
        pub fn connect(process: &str) -> Result<Self> {
            let formatter = Formatter3164 {
                facility: Facility::LOG_USER,
                hostname: None,
                process: process.to_string(),
                pid: std::process::id(),
            };
            let logger = syslog::unix(formatter)
                .map_err(|e| ReplayLogError::Config(format!("Failed to connect to syslog: {}", e)))?;

            Ok(Self {
                logger: Arc::new(Mutex::new(logger)),
            })
        }

        fn line(&self, level: Level) -> SyslogLine {
            SyslogLine {
                logger: Arc::clone(&self.logger),
                level,
                buf: Vec::new(),
            }
        }
    }

    impl<'a> MakeWriter<'a> for SyslogMakeWriter {
        type Writer = SyslogLine;

        fn make_writer(&'a self) -> Self::Writer {
            self.line(Level::INFO)
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            self.line(*meta.level())
        }
    }

    /// Collects one formatted event and sends it on drop
    pub struct SyslogLine {
        logger: Arc<Mutex<SysLogger>>,
        level: Level,
        buf: Vec<u8>,
    }

    impl io::Write for SyslogLine {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.buf.extend_from_slice(data);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for SyslogLine {
        fn drop(&mut self) {
            let message = String::from_utf8_lossy(&self.buf);
            let message = message.trim_end();
            if message.is_empty() {
                return;
            }

            let mut logger = self.logger.lock();
            let _ = if self.level == Level::ERROR {
                logger.err(message)
            } else if self.level == Level::WARN {
                logger.warning(message)
            } else if self.level == Level::INFO {
                logger.info(message)
            } else {
                logger.debug(message)
            };
        }
    }
}
