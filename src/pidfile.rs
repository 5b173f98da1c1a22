use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

/// File holding the daemon's process id, removed on drop
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Create `path` and write the current process id into it.
    ///
    /// Fails with `AlreadyExists` when the file is present, which means another
    /// daemon is running or a previous one did not shut down cleanly.
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        write!(file, "{}", std::process::id())?;

        debug!("Wrote pidfile {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Process id stored in an existing pidfile
    pub fn read(path: &Path) -> io::Result<u32> {
        let content = fs::read_to_string(path)?;
        content
            .trim()
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Could not remove pidfile {}: {}", self.path.display(), e);
        }
    }
}
