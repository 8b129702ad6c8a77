//! Scratch Files
//!
//! Some tools can only write their results to a file. Each invocation gets
//! its own uniquely named path under the scratch directory, and the file is
//! removed when the handle is dropped, whichever way the invocation ended.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A scratch path owned by exactly one invocation
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    /// Reserve a unique path for `tool` under `dir`.
    ///
    /// The directory is created if needed. The file itself is not created;
    /// the tool is expected to write it.
    pub fn allocate(dir: &Path, tool: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}-{}.out", tool, Uuid::new_v4().simple()));
        debug!("Allocated scratch file {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {:?}", self.path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove scratch file {:?}: {}", self.path, e),
        }
    }
}
