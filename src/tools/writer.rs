//! Write a literal string to a file

use crate::{ReplayLogError, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error};

/// Create or truncate `path` and write `text` into it
pub fn write_string<P: AsRef<Path>>(path: P, text: &str) -> Result<()> {
    let path = path.as_ref();

    let written = File::create(path).and_then(|mut file| {
        file.write_all(text.as_bytes())?;
        file.sync_all()
    });

    match written {
        Ok(()) => {
            debug!("Writing {} to {}", text, path.display());
            Ok(())
        }
        Err(e) => {
            error!("Could not write to file '{}': {}", path.display(), e);
            Err(ReplayLogError::Io(e))
        }
    }
}
