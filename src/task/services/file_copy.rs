//! Blocking filesystem helpers for promoting finished payloads.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io;

/// Selects which payload files are promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeFilePolicy {
    threshold_bytes: u64,
}

impl LargeFilePolicy {
    /// One gibibyte.
    pub const DEFAULT_THRESHOLD_BYTES: u64 = 1 << 30;

    /// Creates a policy selecting files of at least `threshold_bytes`.
    #[must_use]
    pub const fn new(threshold_bytes: u64) -> Self {
        Self { threshold_bytes }
    }

    /// Returns the size threshold in bytes.
    #[must_use]
    pub const fn threshold_bytes(self) -> u64 {
        self.threshold_bytes
    }

    /// Returns `true` when a file of `size` bytes is promoted.
    #[must_use]
    pub const fn selects(self, size: u64) -> bool {
        size >= self.threshold_bytes
    }
}

impl Default for LargeFilePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD_BYTES)
    }
}

/// Copies every regular file under `source_root` selected by `policy` to the
/// same relative path under `target_root`, overwriting existing files.
///
/// Returns the relative paths that were copied.
///
/// # Errors
///
/// Returns the first I/O error; files copied before it stay in place.
pub fn copy_large_files(
    source_root: &Utf8Path,
    target_root: &Utf8Path,
    policy: LargeFilePolicy,
) -> io::Result<Vec<Utf8PathBuf>> {
    let source = Dir::open_ambient_dir(source_root, ambient_authority())?;
    Dir::create_ambient_dir_all(target_root, ambient_authority())?;
    let target = Dir::open_ambient_dir(target_root, ambient_authority())?;

    let mut copied = Vec::new();
    copy_tree(&source, &target, Utf8Path::new(""), policy, &mut copied)?;
    Ok(copied)
}

fn copy_tree(
    source: &Dir,
    target: &Dir,
    relative: &Utf8Path,
    policy: LargeFilePolicy,
    copied: &mut Vec<Utf8PathBuf>,
) -> io::Result<()> {
    for item in source.entries()? {
        let dir_entry = item?;
        let name = dir_entry.file_name()?;
        let file_type = dir_entry.file_type()?;
        let path = relative.join(&name);

        if file_type.is_dir() {
            let child = dir_entry.open_dir()?;
            copy_tree(&child, target, &path, policy, copied)?;
        } else if file_type.is_file() && policy.selects(dir_entry.metadata()?.len()) {
            if !relative.as_str().is_empty() {
                target.create_dir_all(relative)?;
            }
            source.copy(&name, target, &path)?;
            tracing::info!(file = %path, "large file copied");
            copied.push(path);
        }
    }
    Ok(())
}

/// Copies one file, creating the target's parent directories.
///
/// # Errors
///
/// Returns an error when the source does not exist or the copy fails.
pub fn copy_single_file(source_path: &Utf8Path, target_path: &Utf8Path) -> io::Result<u64> {
    let (source_dir, source_name) = open_parent(source_path)?;
    Dir::create_ambient_dir_all(parent_or_current(target_path), ambient_authority())?;
    let (target_dir, target_name) = open_parent(target_path)?;
    source_dir.copy(source_name, &target_dir, target_name)
}

fn open_parent(path: &Utf8Path) -> io::Result<(Dir, &str)> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("path {path} has no file name")))?;
    let dir = Dir::open_ambient_dir(parent_or_current(path), ambient_authority())?;
    Ok((dir, file_name))
}

fn parent_or_current(path: &Utf8Path) -> &Utf8Path {
    path.parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."))
}
