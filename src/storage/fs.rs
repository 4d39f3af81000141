//! Filesystem abstraction and the OS-backed implementation

use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

use async_trait::async_trait;
use filetime::FileTime;

/// The filesystem operations the store and registry rely on
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Create a single directory; fails with `AlreadyExists` if present
    async fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Whether a file or directory exists at `path`
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Read a whole file
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace a file's contents; readers see the old or new contents, never
    /// a mix
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Last modification time
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Overwrite the modification time
    async fn set_modified(&self, path: &Path, mtime: SystemTime) -> io::Result<()>;
}

/// Filesystem backed by `tokio::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFilesystem;

impl OsFilesystem {
    /// Create a new OS filesystem handle
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Write `contents` to a uniquely named file next to `path`, then move it
/// over `path`
///
/// Every writer gets its own temp file, so concurrent writes to one path
/// never share a partial file and the last rename wins.
fn persist_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::Builder::new()
        .prefix(".golder-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(contents)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl Filesystem for OsFilesystem {
    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir(path).await
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(path).await
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let path = path.to_path_buf();
        let contents = contents.to_vec();
        tokio::task::spawn_blocking(move || persist_atomically(&path, &contents))
            .await
            .map_err(io::Error::other)?
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn set_modified(&self, path: &Path, mtime: SystemTime) -> io::Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            filetime::set_file_mtime(&path, FileTime::from_system_time(mtime))
        })
        .await
        .map_err(io::Error::other)?
    }
}
