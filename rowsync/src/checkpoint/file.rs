use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowsync_config::shared::TableConfig;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::checkpoint::base::{add_missing, advance};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{ErrorKind, SyncResult};
use crate::sync_error;

/// Inner state of [`FileCheckpointStore`].
#[derive(Debug)]
struct Inner {
    path: PathBuf,
    /// In-memory checkpoints, the source of truth for reads.
    checkpoints: RwLock<BTreeMap<String, u64>>,
    /// Serializes updates together with the file rewrite they trigger.
    write_lock: Mutex<()>,
}

/// Checkpoint store backed by a JSON file.
///
/// The file holds an array of `{"table_name", "last_id"}` objects ordered by table name and is
/// rewritten in full on every update. Rewrites go through a sibling temporary file which is
/// renamed over the target, so a crash never leaves a truncated file behind. The containing
/// directory is synced after the rename so the new content can't be lost on power failure.
///
/// Reads are served from memory and never wait for file I/O. Updates hold an exclusive lock from
/// the in-memory change until the rewrite completes, so the file always reflects every update
/// that finished before it.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    inner: Arc<Inner>,
}

impl FileCheckpointStore {
    /// Creates a store for the file at `path`.
    ///
    /// Nothing is read until [`CheckpointStore::load`] is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let inner = Inner {
            path: path.into(),
            checkpoints: RwLock::new(BTreeMap::new()),
            write_lock: Mutex::new(()),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    fn temporary_path(&self) -> PathBuf {
        let mut file_name = self
            .inner
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".tmp");

        self.inner.path.with_file_name(file_name)
    }

    /// Directory holding the checkpoint file. A bare file name lives in the working directory.
    fn directory(&self) -> PathBuf {
        match self.inner.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Writes `checkpoints` to the file, replacing its previous content atomically.
    ///
    /// Must be called while holding `write_lock`.
    async fn persist(&self, checkpoints: &BTreeMap<String, u64>) -> SyncResult<()> {
        let entries = checkpoints
            .iter()
            .map(|(table_name, last_id)| Checkpoint {
                table_name: table_name.clone(),
                last_id: *last_id,
            })
            .collect::<Vec<_>>();

        let content = serde_json::to_vec_pretty(&entries).map_err(|err| {
            sync_error!(
                ErrorKind::SerializationError,
                "Failed to serialize checkpoints",
                err.to_string(),
                source: err
            )
        })?;

        let temporary_path = self.temporary_path();
        self.write_file(&temporary_path, &content)
            .await
            .map_err(|err| {
                sync_error!(
                    ErrorKind::CheckpointPersistenceFailed,
                    "Failed to write checkpoint file",
                    format!("Could not write '{}': {err}", temporary_path.display()),
                    source: err
                )
            })?;

        tokio::fs::rename(&temporary_path, &self.inner.path)
            .await
            .map_err(|err| {
                sync_error!(
                    ErrorKind::CheckpointPersistenceFailed,
                    "Failed to replace checkpoint file",
                    format!(
                        "Could not rename '{}' to '{}': {err}",
                        temporary_path.display(),
                        self.inner.path.display()
                    ),
                    source: err
                )
            })?;

        let directory = self.directory();
        sync_directory(&directory).await.map_err(|err| {
            sync_error!(
                ErrorKind::CheckpointPersistenceFailed,
                "Failed to sync checkpoint directory",
                format!("Could not sync '{}': {err}", directory.display()),
                source: err
            )
        })?;

        debug!(
            path = %self.inner.path.display(),
            checkpoints = entries.len(),
            "persisted checkpoints"
        );

        Ok(())
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(path).await?;
        file.write_all(content).await?;
        file.sync_all().await?;

        Ok(())
    }
}

/// Flushes the directory entry so that a completed rename survives a power loss.
#[cfg(unix)]
async fn sync_directory(directory: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(directory).await?.sync_all().await
}

/// Directories can't be opened as files here, the rename is as durable as it gets.
#[cfg(not(unix))]
async fn sync_directory(_directory: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> SyncResult<usize> {
        let _write_guard = self.inner.write_lock.lock().await;

        let content = match tokio::fs::read(&self.inner.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    path = %self.inner.path.display(),
                    "checkpoint file not found, starting with no checkpoints"
                );

                self.inner.checkpoints.write().await.clear();

                return Ok(0);
            }
            Err(err) => {
                return Err(sync_error!(
                    ErrorKind::CheckpointPersistenceFailed,
                    "Failed to read checkpoint file",
                    format!("Could not read '{}': {err}", self.inner.path.display()),
                    source: err
                ));
            }
        };

        let entries: Vec<Checkpoint> = serde_json::from_slice(&content).map_err(|err| {
            sync_error!(
                ErrorKind::CheckpointCorrupted,
                "Checkpoint file is malformed",
                format!("Could not parse '{}': {err}", self.inner.path.display()),
                source: err
            )
        })?;

        let loaded = entries
            .into_iter()
            .map(|entry| (entry.table_name, entry.last_id))
            .collect::<BTreeMap<_, _>>();
        let count = loaded.len();

        *self.inner.checkpoints.write().await = loaded;

        info!(
            path = %self.inner.path.display(),
            checkpoints = count,
            "loaded checkpoints"
        );

        Ok(count)
    }

    async fn initialize(&self, tables: &[TableConfig]) -> SyncResult<()> {
        let _write_guard = self.inner.write_lock.lock().await;

        let snapshot = {
            let mut checkpoints = self.inner.checkpoints.write().await;
            if !add_missing(&mut checkpoints, tables) {
                return Ok(());
            }

            checkpoints.clone()
        };

        self.persist(&snapshot).await
    }

    async fn get_checkpoint(&self, table_name: &str) -> SyncResult<u64> {
        let checkpoints = self.inner.checkpoints.read().await;

        Ok(checkpoints.get(table_name).copied().unwrap_or(0))
    }

    async fn set_and_persist(&self, table_name: &str, last_id: u64) -> SyncResult<()> {
        let _write_guard = self.inner.write_lock.lock().await;

        let snapshot = {
            let mut checkpoints = self.inner.checkpoints.write().await;
            advance(&mut checkpoints, table_name, last_id)?;

            checkpoints.clone()
        };

        self.persist(&snapshot).await
    }

    async fn checkpoints(&self) -> SyncResult<BTreeMap<String, u64>> {
        Ok(self.inner.checkpoints.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::test_utils::table::test_table_config;

    async fn read_entries(path: &Path) -> Vec<Checkpoint> {
        let content = tokio::fs::read(path).await.unwrap();
        serde_json::from_slice(&content).unwrap()
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("checkpoints.json"));

        assert_eq!(store.load().await.unwrap(), 0);
        assert!(store.checkpoints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let err = FileCheckpointStore::new(&path).load().await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CheckpointCorrupted);
        assert_eq!(err.category(), ErrorCategory::Persistence);
    }

    #[tokio::test]
    async fn legacy_keys_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        tokio::fs::write(
            &path,
            br#"[{"Table": "history", "Startid": 42}, {"table_name": "trends", "last_id": 7}]"#,
        )
        .await
        .unwrap();

        let store = FileCheckpointStore::new(&path);
        assert_eq!(store.load().await.unwrap(), 2);
        assert_eq!(store.get_checkpoint("history").await.unwrap(), 42);
        assert_eq!(store.get_checkpoint("trends").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn updates_rewrite_the_whole_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let store = FileCheckpointStore::new(&path);
        store.load().await.unwrap();

        store
            .initialize(&[
                test_table_config("trends", 10),
                test_table_config("history", 100),
            ])
            .await
            .unwrap();
        store.set_and_persist("history", 149).await.unwrap();

        assert_eq!(
            read_entries(&path).await,
            vec![
                Checkpoint {
                    table_name: "history".to_owned(),
                    last_id: 149
                },
                Checkpoint {
                    table_name: "trends".to_owned(),
                    last_id: 10
                },
            ]
        );
        assert!(!store.temporary_path().exists());
    }

    #[tokio::test]
    async fn unconfigured_tables_survive_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        tokio::fs::write(&path, br#"[{"table_name": "retired", "last_id": 9}]"#)
            .await
            .unwrap();

        let store = FileCheckpointStore::new(&path);
        store.load().await.unwrap();
        store
            .initialize(&[test_table_config("history", 0)])
            .await
            .unwrap();
        store.set_and_persist("history", 5).await.unwrap();

        let reloaded = FileCheckpointStore::new(&path);
        reloaded.load().await.unwrap();
        let checkpoints = reloaded.checkpoints().await.unwrap();
        assert_eq!(checkpoints.get("retired"), Some(&9));
        assert_eq!(checkpoints.get("history"), Some(&5));
    }

    #[tokio::test]
    async fn backwards_update_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let store = FileCheckpointStore::new(&path);
        store
            .initialize(&[test_table_config("history", 149)])
            .await
            .unwrap();
        let before = tokio::fs::read(&path).await.unwrap();

        let err = store.set_and_persist("history", 100).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), before);
        assert_eq!(store.get_checkpoint("history").await.unwrap(), 149);
    }

    #[test]
    fn bare_file_name_syncs_working_directory() {
        assert_eq!(
            FileCheckpointStore::new("checkpoints.json").directory(),
            PathBuf::from(".")
        );
        assert_eq!(
            FileCheckpointStore::new("/var/lib/rowsync/checkpoints.json").directory(),
            PathBuf::from("/var/lib/rowsync")
        );
    }

    #[tokio::test]
    async fn rewrite_syncs_directory_and_leaves_only_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state");
        tokio::fs::create_dir(&nested).await.unwrap();
        let path = nested.join("checkpoints.json");
        let store = FileCheckpointStore::new(&path);

        store.set_and_persist("history", 10).await.unwrap();
        store.set_and_persist("history", 20).await.unwrap();

        let mut entries = tokio::fs::read_dir(&nested).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name());
        }
        assert_eq!(names, vec![std::ffi::OsString::from("checkpoints.json")]);
        assert_eq!(
            read_entries(&path).await,
            vec![Checkpoint {
                table_name: "history".to_owned(),
                last_id: 20
            }]
        );
    }

    #[tokio::test]
    async fn write_failure_surfaces_but_memory_is_updated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("checkpoints.json");
        let store = FileCheckpointStore::new(&path);

        let err = store.set_and_persist("history", 10).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::CheckpointPersistenceFailed);
        assert_eq!(store.get_checkpoint("history").await.unwrap(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.json");
        let store = FileCheckpointStore::new(&path);

        let mut handles = Vec::new();
        for table in ["a", "b", "c", "d"] {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for last_id in 1..=20 {
                    store.set_and_persist(table, last_id).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let reloaded = FileCheckpointStore::new(&path);
        reloaded.load().await.unwrap();
        let checkpoints = reloaded.checkpoints().await.unwrap();
        assert_eq!(checkpoints.len(), 4);
        assert!(checkpoints.values().all(|last_id| *last_id == 20));
    }
}
