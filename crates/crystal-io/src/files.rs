//! Collision-free file creation.
//!
//! Reports are never overwritten. The first candidate is `base.ext`,
//! then `base_1.ext`, `base_2.ext`, and so on. Files are opened with
//! create-new semantics, so two writers racing for the same name both
//! succeed with different suffixes.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::IoError;

/// Suffixes tried before giving up.
pub const MAX_UNIQUE_ATTEMPTS: u32 = 10_000;

/// File name for attempt `n`: `base.ext` for 0, `base_n.ext` after.
///
/// `ext` is given without the leading dot.
#[must_use]
pub fn unique_candidate(base: &str, ext: &str, n: u32) -> String {
    if n == 0 {
        format!("{base}.{ext}")
    } else {
        format!("{base}_{n}.{ext}")
    }
}

/// Create `dir` and any missing parents.
///
/// # Errors
///
/// Returns [`IoError::CreateDir`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<(), IoError> {
    std::fs::create_dir_all(dir).map_err(|source| IoError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Create a new, empty file under `dir` with the first free name.
///
/// # Errors
///
/// Returns [`IoError::Create`] for any failure other than the name
/// being taken, or [`IoError::NamesExhausted`] if every candidate is.
pub fn create_unique(dir: &Path, base: &str, ext: &str) -> Result<(PathBuf, File), IoError> {
    for n in 0..MAX_UNIQUE_ATTEMPTS {
        let path = dir.join(unique_candidate(base, ext, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(source) => return Err(IoError::Create { path, source }),
        }
    }
    Err(IoError::NamesExhausted {
        path: dir.join(unique_candidate(base, ext, 0)),
        attempts: MAX_UNIQUE_ATTEMPTS,
    })
}

/// Write `bytes` to a new file under `dir` with the first free name and
/// return its path.
///
/// # Errors
///
/// See [`create_unique`]; additionally [`IoError::Write`] if writing
/// fails, in which case the partial file is removed.
pub fn write_unique(dir: &Path, base: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf, IoError> {
    let (path, file) = create_unique(dir, base, ext)?;
    fill_new(path, file, |f| f.write_all(bytes).and_then(|()| f.flush()))
}

/// Run `write` on a freshly created file; on failure the file is closed
/// and deleted so no truncated output is left behind.
fn fill_new(
    path: PathBuf,
    mut file: File,
    write: impl FnOnce(&mut File) -> io::Result<()>,
) -> Result<PathBuf, IoError> {
    let result = write(&mut file);
    drop(file);
    match result {
        Ok(()) => Ok(path),
        Err(source) => {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "could not remove partial file");
            }
            Err(IoError::Write { path, source })
        }
    }
}
