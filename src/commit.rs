//! Write-then-verify-then-delete replacement of an original by its conversion.

use crate::constants::TEMP_FILE_PREFIX;
use crate::error::{NormalizeError, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Filesystem operations the committer relies on.
pub trait Storage: Send + Sync {
    /// Place `bytes` at `path` so readers never observe a partial file.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Post-write check: `path` is a regular file of `expected_len` bytes.
    fn verify(&self, path: &Path, expected_len: u64) -> bool;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        // Same directory as the target so the final rename never crosses filesystems.
        let mut temp = tempfile::Builder::new()
            .prefix(TEMP_FILE_PREFIX)
            .suffix(".tmp")
            .tempfile_in(parent)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn verify(&self, path: &Path, expected_len: u64) -> bool {
        fs::metadata(path)
            .map(|meta| meta.is_file() && meta.len() == expected_len)
            .unwrap_or(false)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    pub output_size: u64,
}

/// Replace `input` with `bytes` written at `output`.
///
/// The original is only removed once the output has been confirmed on disk.
/// A failed removal leaves both files in place and reports `Delete`.
pub fn commit(
    storage: &dyn Storage,
    input: &Path,
    output: &Path,
    bytes: &[u8],
) -> Result<CommitReport> {
    storage
        .write_atomic(output, bytes)
        .map_err(|e| NormalizeError::Encode {
            path: output.to_path_buf(),
            reason: e.to_string(),
        })?;

    let output_size = bytes.len() as u64;
    if !storage.verify(output, output_size) {
        return Err(NormalizeError::CommitVerify(output.to_path_buf()));
    }

    storage
        .remove(input)
        .map_err(|source| NormalizeError::Delete {
            path: input.to_path_buf(),
            source,
        })?;

    Ok(CommitReport { output_size })
}
