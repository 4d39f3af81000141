//! Snapshot store: one file per route

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tracing::debug;

use super::fs::Filesystem;
use super::snapshot::{self, Snapshot};
use crate::network::Response;
use crate::policy::{self, RefreshPolicy};
use crate::Result;

/// Freshness of a route's snapshot at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No snapshot on disk
    Missing,
    /// Snapshot may be served
    Fresh {
        /// Time since the last write
        age: Duration,
    },
    /// Snapshot must be re-golded
    Stale {
        /// Time since the last write
        age: Duration,
    },
}

impl EntryState {
    /// Whether a snapshot exists
    #[must_use]
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Missing)
    }

    /// Whether the snapshot can be served without fetching
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

/// Reads and writes snapshot files through a `Filesystem`
#[derive(Clone)]
pub struct SnapshotStore {
    fs: Arc<dyn Filesystem>,
}

impl SnapshotStore {
    /// Create a store over `fs`
    #[must_use]
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self { fs }
    }

    /// Whether a snapshot exists at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the filesystem cannot be queried
    pub async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.fs.exists(path).await?)
    }

    /// Time since the snapshot at `path` was written, `None` if missing
    ///
    /// # Errors
    ///
    /// Returns error if the filesystem cannot be queried
    pub async fn age(&self, path: &Path, now: SystemTime) -> Result<Option<Duration>> {
        if !self.exists(path).await? {
            return Ok(None);
        }
        let written_at = self.fs.modified(path).await?;
        Ok(Some(policy::age(written_at, now)))
    }

    /// Work out whether the snapshot at `path` is missing, fresh or stale
    ///
    /// # Errors
    ///
    /// Returns error if the filesystem cannot be queried
    pub async fn state(
        &self,
        path: &Path,
        refresh: Option<RefreshPolicy>,
        now: SystemTime,
    ) -> Result<EntryState> {
        if !self.exists(path).await? {
            return Ok(EntryState::Missing);
        }

        let written_at = self.fs.modified(path).await?;
        let age = policy::age(written_at, now);
        if policy::is_fresh(written_at, refresh, now) {
            Ok(EntryState::Fresh { age })
        } else {
            Ok(EntryState::Stale { age })
        }
    }

    /// Read the snapshot at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or cannot be decoded
    pub async fn read(&self, path: &Path) -> Result<Snapshot> {
        let data = self.fs.read(path).await?;
        let response = snapshot::decode(path, &data)?;
        let written_at = self.fs.modified(path).await?;

        debug!("Read snapshot {} ({})", path.display(), response.status);

        Ok(Snapshot {
            response,
            written_at,
        })
    }

    /// Overwrite the snapshot at `path` with `response`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub async fn write(&self, path: &Path, response: &Response) -> Result<Snapshot> {
        let data = snapshot::encode(path, response)?;
        self.fs.write(path, &data).await?;
        let written_at = self.fs.modified(path).await?;

        debug!(
            "Wrote snapshot {} ({}, {} bytes)",
            path.display(),
            response.status,
            data.len()
        );

        Ok(Snapshot {
            response: response.clone(),
            written_at,
        })
    }

    /// Move the snapshot's write time, used to simulate aging
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing
    pub async fn set_written_at(&self, path: &Path, written_at: SystemTime) -> Result<()> {
        Ok(self.fs.set_modified(path, written_at).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryFilesystem;
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn store() -> SnapshotStore {
        SnapshotStore::new(Arc::new(MemoryFilesystem::new()))
    }

    fn ok_response() -> Response {
        let mut headers = BTreeMap::new();
        headers.insert("etag".to_string(), "\"abc\"".to_string());
        Response {
            status: 200,
            headers,
            body: Bytes::from_static(b"test-body"),
        }
    }

    #[tokio::test]
    async fn test_write_then_read_round_trips() {
        let store = store();
        let path = Path::new("/golds/suite/homepage.json");

        let written = store.write(path, &ok_response()).await.unwrap();
        let read = store.read(path).await.unwrap();

        assert_eq!(read.response, ok_response());
        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn test_state_transitions_with_age() {
        let store = store();
        let path = Path::new("/golds/suite/homepage.json");
        let weekly = Some(RefreshPolicy::Weekly);
        let now = SystemTime::now();

        assert_eq!(
            store.state(path, weekly, now).await.unwrap(),
            EntryState::Missing
        );
        assert_eq!(store.age(path, now).await.unwrap(), None);

        store.write(path, &ok_response()).await.unwrap();
        assert!(store.state(path, weekly, SystemTime::now()).await.unwrap().is_fresh());

        let eight_days = Duration::from_secs(8 * 86_400);
        store.set_written_at(path, now - eight_days).await.unwrap();
        assert_eq!(
            store.state(path, weekly, now).await.unwrap(),
            EntryState::Stale { age: eight_days }
        );
        assert_eq!(
            store.state(path, None, now).await.unwrap(),
            EntryState::Fresh { age: eight_days }
        );
    }
}
