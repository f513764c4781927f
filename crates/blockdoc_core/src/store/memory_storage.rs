use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::storage::{CrdtStorage, UpdateOrigin, UpdateRecord};
use crate::error::Result;

/// Process-local storage. Everything is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    docs: RwLock<HashMap<String, Entry>>,
    seq: AtomicU64,
}

#[derive(Debug, Default)]
struct Entry {
    state: Option<Vec<u8>>,
    log: Vec<UpdateRecord>,
}

impl MemoryStorage {
    /// An empty storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrdtStorage for MemoryStorage {
    fn load_state(&self, doc: &str) -> Result<Option<Vec<u8>>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(doc).and_then(|entry| entry.state.clone()))
    }

    fn save_state(&self, doc: &str, state: &[u8]) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        let entry = docs.entry(doc.to_string()).or_default();
        entry.state = Some(state.to_vec());
        entry.log.clear();
        Ok(())
    }

    fn append_update(&self, doc: &str, update: &[u8], origin: UpdateOrigin) -> Result<u64> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let record = UpdateRecord {
            seq,
            data: update.to_vec(),
            origin,
            recorded_at: chrono::Utc::now().timestamp_millis(),
        };
        self.docs
            .write()
            .unwrap()
            .entry(doc.to_string())
            .or_default()
            .log
            .push(record);
        Ok(seq)
    }

    fn updates(&self, doc: &str) -> Result<Vec<UpdateRecord>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(doc).map(|entry| entry.log.clone()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_ordered_and_per_document() {
        let storage = MemoryStorage::new();
        let first = storage.append_update("page", b"a", UpdateOrigin::Local).unwrap();
        storage.append_update("other", b"x", UpdateOrigin::Local).unwrap();
        let second = storage.append_update("page", b"b", UpdateOrigin::Remote).unwrap();

        let log = storage.updates("page").unwrap();
        assert!(first < second);
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].data, b"b".to_vec());
        assert_eq!(log[1].origin, UpdateOrigin::Remote);
        assert!(storage.updates("missing").unwrap().is_empty());
    }

    #[test]
    fn test_save_state_clears_log() {
        let storage = MemoryStorage::new();
        storage.append_update("page", b"a", UpdateOrigin::Local).unwrap();

        storage.save_state("page", b"state").unwrap();

        assert_eq!(storage.load_state("page").unwrap(), Some(b"state".to_vec()));
        assert!(storage.updates("page").unwrap().is_empty());
        assert!(storage.load_state("other").unwrap().is_none());
    }
}
