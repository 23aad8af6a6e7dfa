use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, PoisonError},
};

use common::{error::AppError, storage::store::StorageManager};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::vector_index::VectorIndex;

/// Exclusive right to mutate one material's index.
///
/// Obtained from [`StoreCache::write_lock`]; writers on the same material
/// queue behind each other while other materials proceed independently.
pub struct MaterialWriteGuard {
    material_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: WriteLocks,
}

impl MaterialWriteGuard {
    pub fn material_id(&self) -> &str {
        &self.material_id
    }
}

impl Drop for MaterialWriteGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        self.guard.take();
        // Only the map still points at the mutex: no holder, no waiter.
        if locks
            .get(&self.material_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.material_id);
        }
    }
}

/// Per-material writer mutexes. Entries live only while a guard is held or
/// awaited, so the table never outgrows the set of in-flight writers.
type WriteLocks = Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>;

/// In-memory map from material id to its loaded index, backed by storage.
///
/// Readers never wait on writers once an index is cached: they see the last
/// committed version until a commit swaps in the next one. A cache miss
/// loads under the material's write lock so it cannot race a delete or an
/// overwrite of the same material.
pub struct StoreCache {
    storage: StorageManager,
    prefix: String,
    entries: RwLock<HashMap<String, Arc<VectorIndex>>>,
    write_locks: WriteLocks,
}

impl StoreCache {
    pub fn new(storage: StorageManager, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        Self {
            storage,
            prefix,
            entries: RwLock::new(HashMap::new()),
            write_locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Storage location holding the serialized index of `material_id`.
    pub fn location_for(&self, material_id: &str) -> String {
        format!("{}/{material_id}.index.json", self.prefix)
    }

    pub async fn write_lock(&self, material_id: &str) -> MaterialWriteGuard {
        let lock = {
            let mut locks = self
                .write_locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(material_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        MaterialWriteGuard {
            material_id: material_id.to_string(),
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(&self.write_locks),
        }
    }

    /// Resolves the index of `material_id`, loading it from storage on a miss.
    ///
    /// Absent or unreadable data is reported as `None` and logged; it is
    /// never surfaced as an error.
    pub async fn get(&self, material_id: &str) -> Option<Arc<VectorIndex>> {
        if let Some(index) = self.cached(material_id).await {
            return Some(index);
        }

        let _guard = self.write_lock(material_id).await;
        // Another request may have loaded or committed it while we waited.
        if let Some(index) = self.cached(material_id).await {
            return Some(index);
        }

        let location = self.location_for(material_id);
        match VectorIndex::load(&self.storage, &location, material_id).await {
            Ok(index) => {
                let index = Arc::new(index);
                self.entries
                    .write()
                    .await
                    .insert(material_id.to_string(), Arc::clone(&index));
                info!(
                    %material_id,
                    %location,
                    chunks = index.len(),
                    "loaded vector index from storage"
                );
                Some(index)
            }
            Err(AppError::VectorStoreNotFound(_)) => {
                debug!(%material_id, %location, "no stored vector index");
                None
            }
            Err(err) => {
                warn!(
                    %material_id,
                    %location,
                    error = %err,
                    "failed to load vector index; treating as not found"
                );
                None
            }
        }
    }

    /// Persists `index` and then makes it the cached version.
    ///
    /// Nothing is cached when persisting fails, so the cache never serves an
    /// index that storage cannot reproduce.
    pub async fn commit(
        &self,
        guard: &MaterialWriteGuard,
        index: VectorIndex,
    ) -> Result<(Arc<VectorIndex>, String), AppError> {
        if guard.material_id() != index.material_id() {
            return Err(AppError::InternalError(format!(
                "write guard for {} used to commit {}",
                guard.material_id(),
                index.material_id()
            )));
        }

        let location = self.location_for(index.material_id());
        index.persist(&self.storage, &location).await?;

        let material_id = index.material_id().to_string();
        let index = Arc::new(index);
        self.entries
            .write()
            .await
            .insert(material_id, Arc::clone(&index));

        Ok((index, location))
    }

    /// Drops the cached entry and then the stored object. A stored object
    /// that is already gone is not an error. Returns whether anything existed.
    pub async fn remove(&self, guard: &MaterialWriteGuard) -> Result<bool, AppError> {
        let material_id = guard.material_id();
        let was_cached = self.invalidate(material_id).await;
        let location = self.location_for(material_id);
        let was_stored = self.storage.delete(&location).await?;

        debug!(%material_id, was_cached, was_stored, "removed vector index");
        Ok(was_cached || was_stored)
    }

    /// Removes the cache entry only. Returns whether one was present.
    pub async fn invalidate(&self, material_id: &str) -> bool {
        self.entries.write().await.remove(material_id).is_some()
    }

    pub async fn contains(&self, material_id: &str) -> bool {
        self.entries.read().await.contains_key(material_id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    #[cfg(test)]
    fn tracked_write_locks(&self) -> usize {
        self.write_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    async fn cached(&self, material_id: &str) -> Option<Arc<VectorIndex>> {
        self.entries.read().await.get(material_id).cloned()
    }
}
