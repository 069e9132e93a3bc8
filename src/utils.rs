use std::fs::File;
use std::io::Write;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::Result;

/// Writes a fully encoded file to `path`, creating or truncating it
///
/// If writing fails the incomplete file is removed before the error is
/// returned. The handle is dropped on every path.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    let written = file.write_all(bytes).and_then(|()| file.sync_all());
    drop(file);
    if let Err(err) = written {
        if let Err(rm_err) = std::fs::remove_file(path) {
            warn!(path = %path.display(), %rm_err, "unable to remove incomplete file");
        }
        return Err(err.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}
