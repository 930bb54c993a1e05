//! Process detachment for daemon mode

use crate::{ReplayLogError, Result};
use nix::libc::{STDERR_FILENO, STDIN_FILENO, STDOUT_FILENO};
use nix::unistd::{chdir, dup2, fork, setsid, ForkResult, Pid};
use std::fs::OpenOptions;
use std::os::fd::AsRawFd;
use tracing::debug;

/// Which side of the fork the caller is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// Original process; it should release its resources and exit 0
    Parent {
        /// Pid of the detached child
        child: Pid,
    },
    /// Detached child; it continues into `listen` and the accept loop
    Child,
}

fn step_failed(step: &str, err: impl std::fmt::Display) -> ReplayLogError {
    ReplayLogError::Daemon(format!("{} failed: {}", step, err))
}

/// Fork, start a new session, move to `/` and point stdio at `/dev/null`.
///
/// Must run before any thread (including the tokio runtime) is started.
pub fn detach() -> Result<Detached> {
    // SAFETY: the process is still single-threaded at this point.
    match unsafe { fork() }.map_err(|e| step_failed("fork", e))? {
        ForkResult::Parent { child } => {
            debug!(%child, "Forked daemon child");
            Ok(Detached::Parent { child })
        }
        ForkResult::Child => {
            setsid().map_err(|e| step_failed("setsid", e))?;
            chdir("/").map_err(|e| step_failed("chdir", e))?;
            redirect_standard_streams()?;
            Ok(Detached::Child)
        }
    }
}

fn redirect_standard_streams() -> Result<()> {
    let null = OpenOptions::new()
        .read(true)
        .write(true)
        .open("/dev/null")
        .map_err(|e| step_failed("open /dev/null", e))?;

    for fd in [STDIN_FILENO, STDOUT_FILENO, STDERR_FILENO] {
        dup2(null.as_raw_fd(), fd).map_err(|e| step_failed("dup2", e))?;
    }
    Ok(())
}
