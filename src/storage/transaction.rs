use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use crate::{
    error::Result,
    storage::engine::{prefix_upper_bound, Engine},
};

/// Transactional wrapper around a storage engine
///
/// Uses the underlying storage engine (Engine trait) for CRUD operations.
/// Each transaction buffers its writes; they reach the engine only on
/// commit, so concurrent committers overwrite each other (last commit wins).
pub struct Store<E: Engine> {
    engine: Arc<Mutex<E>>,
}

impl<E: Engine> Clone for Store<E> {
    fn clone(&self) -> Self {
        Self { engine: self.engine.clone() }
    }
}

impl<E: Engine> Store<E> {
    pub fn new(eng: E) -> Self {
        Self {
            engine: Arc::new(Mutex::new(eng)),
        }
    }

    pub fn begin(&self) -> StoreTransaction<E> {
        StoreTransaction {
            engine: self.engine.clone(),
            writes: BTreeMap::new(),
        }
    }
}

/// Buffered storage transaction
pub struct StoreTransaction<E: Engine> {
    engine: Arc<Mutex<E>>,
    /// Pending writes; `None` marks a delete
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<E: Engine> StoreTransaction<E> {
    /// Applies buffered writes to the engine and flushes it
    pub fn commit(&mut self) -> Result<()> {
        let mut engine = self.engine.lock()?;
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(value) => engine.set(key, value)?,
                None => engine.delete(key)?,
            }
        }
        engine.flush()
    }

    /// Discards buffered writes
    pub fn rollback(&mut self) -> Result<()> {
        self.writes.clear();
        Ok(())
    }

    pub fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.writes.insert(key, Some(value));
        Ok(())
    }

    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.writes.insert(key, None);
        Ok(())
    }

    /// Gets the value for a key, own writes first
    pub fn get(&self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(&key) {
            return Ok(pending.clone());
        }
        self.engine.lock()?.get(key)
    }

    /// Scans keys with prefix, merging committed data with own writes
    pub fn scan_prefix(&self, prefix: Vec<u8>) -> Result<Vec<ScanResult>> {
        let mut results = BTreeMap::new();
        {
            let mut engine = self.engine.lock()?;
            let mut iter = engine.scan_prefix(prefix.clone());
            while let Some((key, value)) = iter.next().transpose()? {
                results.insert(key, value);
            }
        }

        let pending = match prefix_upper_bound(&prefix) {
            Some(end) => self.writes.range(prefix..end),
            None => self.writes.range(prefix..),
        };
        for (key, value) in pending {
            match value {
                Some(value) => results.insert(key.clone(), value.clone()),
                None => results.remove(key),
            };
        }

        Ok(results
            .into_iter()
            .map(|(key, value)| ScanResult { key, value })
            .collect())
    }
}

/// Scan result containing key-value pair
#[derive(Debug, PartialEq)]
pub struct ScanResult {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::Store;
    use crate::{error::Result, storage::memory::MemoryEngine};

    #[test]
    fn test_commit_makes_writes_visible() -> Result<()> {
        let store = Store::new(MemoryEngine::new());
        let mut tx = store.begin();
        tx.set(b"key1".to_vec(), b"val1".to_vec())?;
        tx.set(b"key2".to_vec(), b"val2".to_vec())?;

        let other = store.begin();
        assert_eq!(other.get(b"key1".to_vec())?, None);
        assert_eq!(tx.get(b"key1".to_vec())?, Some(b"val1".to_vec()));

        tx.commit()?;
        assert_eq!(other.get(b"key1".to_vec())?, Some(b"val1".to_vec()));
        Ok(())
    }

    #[test]
    fn test_rollback_discards_writes() -> Result<()> {
        let store = Store::new(MemoryEngine::new());
        let mut tx = store.begin();
        tx.set(b"key1".to_vec(), b"val1".to_vec())?;
        tx.rollback()?;
        tx.commit()?;

        assert_eq!(store.begin().get(b"key1".to_vec())?, None);
        Ok(())
    }

    #[test]
    fn test_scan_prefix_merges_pending() -> Result<()> {
        let store = Store::new(MemoryEngine::new());
        let mut setup = store.begin();
        setup.set(b"aa1".to_vec(), b"x".to_vec())?;
        setup.set(b"aa2".to_vec(), b"y".to_vec())?;
        setup.set(b"bb1".to_vec(), b"z".to_vec())?;
        setup.commit()?;

        let mut tx = store.begin();
        tx.delete(b"aa1".to_vec())?;
        tx.set(b"aa3".to_vec(), b"w".to_vec())?;

        let keys: Vec<_> = tx
            .scan_prefix(b"aa".to_vec())?
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec![b"aa2".to_vec(), b"aa3".to_vec()]);
        Ok(())
    }
}
