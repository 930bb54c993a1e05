//! Delayed mutex acquisition on a worker thread

use crate::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// Parameters and outcome of one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadData {
    /// Sleep before trying to lock
    pub wait_to_obtain: Duration,
    /// Sleep while holding the lock
    pub wait_to_release: Duration,
    /// Set once the lock was taken and released
    pub complete_success: bool,
}

/// Spawn a thread that waits, locks `mutex`, waits again, then unlocks.
///
/// Join the handle to get the final [`ThreadData`].
pub fn start_thread_obtaining_mutex(
    mutex: Arc<Mutex<()>>,
    wait_to_obtain: Duration,
    wait_to_release: Duration,
) -> Result<JoinHandle<ThreadData>> {
    let mut data = ThreadData {
        wait_to_obtain,
        wait_to_release,
        complete_success: false,
    };

    let handle = thread::Builder::new()
        .name("mutex-holder".to_string())
        .spawn(move || {
            thread::sleep(data.wait_to_obtain);
            {
                let _guard = mutex.lock();
                debug!("Mutex obtained");
                thread::sleep(data.wait_to_release);
            }
            debug!("Mutex released");
            data.complete_success = true;
            data
        })?;

    Ok(handle)
}
