use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectStore};

use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Storage manager with persistent state and proper lifecycle management.
#[derive(Clone)]
pub struct StorageManager {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl StorageManager {
    /// Create a new StorageManager with the specified configuration.
    ///
    /// For the local backend the base directory is created when missing.
    pub async fn new(cfg: &AppConfig) -> object_store::Result<Self> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg).await?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Create a StorageManager with a custom storage backend.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    /// Fresh in-memory backend, isolated from every other instance.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(InMemory::new()), StorageKind::Memory)
    }

    /// Get the storage backend kind.
    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Access the resolved local base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// Store bytes at the specified location.
    ///
    /// The local backend stages the payload and renames it into place, so a
    /// reader never observes a partially written object.
    pub async fn put(&self, location: &str, data: Bytes) -> object_store::Result<()> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await.map(|_| ())
    }

    /// Retrieve bytes from the specified location.
    pub async fn get(&self, location: &str) -> object_store::Result<Bytes> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        result.bytes().await
    }

    /// Delete a single object. Returns `false` when nothing was stored there.
    pub async fn delete(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        match self.store.head(&path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(err) => return Err(err),
        }

        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            // Removed concurrently between head and delete.
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// List all objects below the specified prefix.
    pub async fn list(
        &self,
        prefix: Option<&str>,
    ) -> object_store::Result<Vec<object_store::ObjectMeta>> {
        let prefix_path = prefix.map(ObjPath::from);
        self.store.list(prefix_path.as_ref()).try_collect().await
    }

    /// Check if an object exists at the specified location.
    pub async fn exists(&self, location: &str) -> object_store::Result<bool> {
        let path = ObjPath::from(location);
        self.store
            .head(&path)
            .await
            .map(|_| true)
            .or_else(|e| match e {
                object_store::Error::NotFound { .. } => Ok(false),
                _ => Err(e),
            })
    }
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    let configured = Path::new(&cfg.data_dir);
    if configured.is_absolute() {
        configured.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(configured)
    }
}

/// Configuration helpers shared by the test suites of dependent crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use std::path::Path;

    use crate::utils::config::{AppConfig, StorageKind};

    /// Configuration with memory storage; nothing touches the filesystem.
    pub fn test_config_memory() -> AppConfig {
        AppConfig {
            openai_api_key: "test".into(),
            openai_base_url: "https://example.com".into(),
            data_dir: "/tmp/unused".into(), // Ignored for memory storage
            storage: StorageKind::Memory,
            ..Default::default()
        }
    }

    /// Configuration with local storage rooted at `root`.
    pub fn test_config_local(root: &Path) -> AppConfig {
        AppConfig {
            openai_api_key: "test".into(),
            openai_base_url: "https://example.com".into(),
            data_dir: root.to_string_lossy().into_owned(),
            storage: StorageKind::Local,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{test_config_local, test_config_memory};
    use super::*;

    #[tokio::test]
    async fn test_storage_manager_memory_basic_operations() {
        let cfg = test_config_memory();
        let storage = StorageManager::new(&cfg)
            .await
            .expect("create storage manager");
        assert!(storage.local_base_path().is_none());

        let location = "vector_store/material.index.json";
        let data = b"test data for storage manager";

        storage
            .put(location, Bytes::from(data.to_vec()))
            .await
            .expect("put");
        let retrieved = storage.get(location).await.expect("get");
        assert_eq!(retrieved.as_ref(), data);

        assert!(storage.exists(location).await.expect("exists"));
        assert!(storage.delete(location).await.expect("delete"));
        assert!(!storage.exists(location).await.expect("exists after delete"));
    }

    #[tokio::test]
    async fn test_delete_missing_object_reports_absent() {
        let storage = StorageManager::in_memory();
        let deleted = storage
            .delete("vector_store/never-written.index.json")
            .await
            .expect("delete of missing object should not error");
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_storage_manager_local_persists_between_instances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join(format!("store_{}", uuid::Uuid::new_v4()));
        let cfg = test_config_local(&root);

        let first = StorageManager::new(&cfg).await.expect("first manager");
        assert_eq!(first.local_base_path(), Some(root.as_path()));
        first
            .put("vector_store/a.index.json", Bytes::from_static(b"{}"))
            .await
            .expect("put");

        let second = StorageManager::new(&cfg).await.expect("second manager");
        let bytes = second
            .get("vector_store/a.index.json")
            .await
            .expect("get from second instance");
        assert_eq!(bytes.as_ref(), b"{}");

        let listed = second.list(Some("vector_store")).await.expect("list");
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn test_in_memory_instances_are_isolated() {
        let a = StorageManager::in_memory();
        let b = StorageManager::in_memory();
        a.put("k", Bytes::from_static(b"v")).await.expect("put");

        assert!(a.exists("k").await.expect("exists"));
        assert!(!b.exists("k").await.expect("exists"));
    }

    #[test]
    fn test_resolve_base_dir_keeps_absolute_paths() {
        let cfg = AppConfig {
            data_dir: "/var/lib/rag".into(),
            ..Default::default()
        };
        assert_eq!(resolve_base_dir(&cfg), PathBuf::from("/var/lib/rag"));
    }
}
