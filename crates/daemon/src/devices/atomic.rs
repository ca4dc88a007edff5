//! All-or-nothing file replacement.

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Replaces the contents of `path` with `contents`.
///
/// The data goes to a dot-prefixed temporary file in the same directory,
/// is flushed to disk and then renamed over `path`. Concurrent readers see
/// either the old or the new contents, never a mix. The temporary file is
/// removed if anything fails before the rename.
pub(crate) fn replace_contents(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .permissions(Permissions::from_mode(mode))
        .tempfile_in(dir)?;

    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Make the rename itself durable.
    if let Err(err) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::debug!("Failed to sync directory {:?}: {}", dir, err);
    }

    Ok(())
}

/// Creates `dir` and its parents if needed.
pub(crate) fn ensure_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}
