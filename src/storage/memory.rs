//! In-memory filesystem for tests

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::fs::Filesystem;

enum Node {
    Dir,
    File {
        contents: Vec<u8>,
        modified: SystemTime,
    },
}

/// A filesystem that lives entirely in memory
///
/// Each instance is independent. Parent directories are not checked, so a
/// file can be written anywhere. Reads and writes are counted so tests can
/// assert on store traffic.
#[derive(Default)]
pub struct MemoryFilesystem {
    nodes: Mutex<HashMap<PathBuf, Node>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryFilesystem {
    /// Create an empty filesystem
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful file reads
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of successful file writes
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Reset the read and write counters
    pub fn reset_counts(&self) {
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::other(format!("{} is a directory", path.display()))
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn create_dir(&self, path: &Path) -> io::Result<()> {
        let mut nodes = self.nodes.lock().await;
        if nodes.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        nodes.insert(path.to_path_buf(), Node::Dir);
        Ok(())
    }

    async fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.nodes.lock().await.contains_key(path))
    }

    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.nodes.lock().await.get(path) {
            Some(Node::File { contents, .. }) => {
                self.reads.fetch_add(1, Ordering::Relaxed);
                Ok(contents.clone())
            }
            Some(Node::Dir) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut nodes = self.nodes.lock().await;
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(is_a_directory(path));
        }
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                contents: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        match self.nodes.lock().await.get(path) {
            Some(Node::File { modified, .. }) => Ok(*modified),
            Some(Node::Dir) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    async fn set_modified(&self, path: &Path, mtime: SystemTime) -> io::Result<()> {
        match self.nodes.lock().await.get_mut(path) {
            Some(Node::File { modified, .. }) => {
                *modified = mtime;
                Ok(())
            }
            Some(Node::Dir) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }
}
