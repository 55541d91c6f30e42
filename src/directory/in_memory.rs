use crate::directory::{DirectoryStore, EntryVersion, StoreError};
use crate::types::{GrainAddress, GrainId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Volatile store for tests and single-process clusters. Versions come from one counter shared by
/// every entry, so a deleted and re-inserted entry never reuses an old version.
#[derive(Default)]
pub struct InMemoryDirectoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<GrainId, (GrainAddress, EntryVersion)>,
    last_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> EntryVersion {
        self.last_version += 1;
        EntryVersion::new(self.last_version)
    }
}

impl InMemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("InMemoryDirectoryStore mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn read(&self, grain_id: &GrainId) -> Result<Option<(GrainAddress, EntryVersion)>, StoreError> {
        let inner = self.inner.lock().expect("InMemoryDirectoryStore mutex poisoned");
        Ok(inner.entries.get(grain_id).cloned())
    }

    async fn insert_if_absent(&self, entry: &GrainAddress) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("InMemoryDirectoryStore mutex poisoned");
        if inner.entries.contains_key(&entry.grain_id) {
            return Ok(false);
        }

        let version = inner.next_version();
        inner.entries.insert(entry.grain_id.clone(), (entry.clone(), version));
        Ok(true)
    }

    async fn replace_if_version(&self, entry: &GrainAddress, expected: EntryVersion) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("InMemoryDirectoryStore mutex poisoned");
        match inner.entries.get(&entry.grain_id) {
            Some((_, current)) if *current == expected => {}
            _ => return Ok(false),
        }

        let version = inner.next_version();
        inner.entries.insert(entry.grain_id.clone(), (entry.clone(), version));
        Ok(true)
    }

    async fn delete_if_version(&self, grain_id: &GrainId, expected: EntryVersion) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("InMemoryDirectoryStore mutex poisoned");
        match inner.entries.get(grain_id) {
            Some((_, current)) if *current == expected => {
                inner.entries.remove(grain_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
