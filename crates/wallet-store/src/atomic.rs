//! Crash-safe file replacement.
//!
//! New contents are written to a uniquely named temp file next to the target,
//! synced, then renamed over the target. A crash leaves either the old file or
//! the complete new one, never a mix.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;
use uuid::Uuid;

const TEMP_SUFFIX: &str = ".tmp";

/// Prefix shared by every temp file staged for `target`: `.<file name>.`
fn temp_prefix(target: &Path) -> io::Result<OsString> {
    let name = target.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a file path: {}", target.display()),
        )
    })?;
    let mut prefix = OsString::from(".");
    prefix.push(name);
    prefix.push(".");
    Ok(prefix)
}

fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// A fully written and synced temp file that has not yet replaced its target.
///
/// Dropping it without [`StagedFile::commit`] removes the temp file and
/// leaves the target untouched.
#[derive(Debug)]
pub struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Rename the temp file over the target and sync the directory entry.
    pub fn commit(mut self) -> io::Result<()> {
        fs::rename(&self.temp, &self.target)?;
        self.committed = true;
        fsync_dir(parent_dir(&self.target))
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp);
        }
    }
}

/// Write `bytes` to a fresh temp file in the target's directory and force it
/// to disk.
pub fn stage(target: &Path, bytes: &[u8]) -> io::Result<StagedFile> {
    let mut name = temp_prefix(target)?;
    name.push(Uuid::new_v4().simple().to_string());
    name.push(TEMP_SUFFIX);
    let temp = parent_dir(target).join(name);

    let staged = StagedFile {
        temp,
        target: target.to_path_buf(),
        committed: false,
    };
    let mut file = create_private(&staged.temp)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()?;
    Ok(staged)
}

/// Replace `target` with `bytes` atomically.
pub fn write_atomic(target: &Path, bytes: &[u8]) -> io::Result<()> {
    stage(target, bytes)?.commit()
}

/// Remove temp files left behind by an interrupted write to `target`.
/// Returns how many were removed.
pub fn cleanup_orphans(target: &Path) -> usize {
    let Ok(prefix) = temp_prefix(target) else {
        return 0;
    };
    let prefix = prefix.to_string_lossy().into_owned();
    let Ok(entries) = fs::read_dir(parent_dir(target)) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(&prefix) && name.ends_with(TEMP_SUFFIX) {
            warn!(path = %entry.path().display(), "removing orphaned store temp file");
            if fs::remove_file(entry.path()).is_ok() {
                removed += 1;
            }
        }
    }
    removed
}

fn create_private(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn fsync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}
