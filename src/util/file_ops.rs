// File Operations for key storage
// Line-oriented reads, atomic writes and lock files

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use tempfile::NamedTempFile;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Read a text file and return its non-blank lines, trimmed
pub fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    let mut file = File::open(path)?;
    let mut data = String::new();
    file.read_to_string(&mut data)?;

    Ok(data
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Write data to file via a uniquely named temporary sibling and a rename,
/// so readers never observe a half-written file
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    // the temporary file is removed on drop if any step fails
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Exclusive lock held as long as the lock file exists.
/// The file is created with create-new semantics and removed on drop.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Wait until the lock file can be created, or fail with `TimedOut`
    pub fn acquire(path: &Path, timeout: Duration) -> io::Result<Self> {
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!("acquired lock {}", path.display());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            format!("timed out waiting for lock {}", path.display()),
                        ));
                    }
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}
