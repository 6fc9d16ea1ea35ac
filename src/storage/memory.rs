use std::{
    collections::{BTreeMap, btree_map},
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{error::Result, storage::engine::{Engine, EngineIterator}};

/// In-memory storage engine
///
/// When opened with a path, the whole map is written to that file as a
/// bincode snapshot on every flush and read back on open.
pub struct MemoryEngine {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    path: Option<PathBuf>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self { data: BTreeMap::new(), path: None }
    }

    /// Opens a snapshot-backed engine, starting empty if the file is missing
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let bytes = fs::read(&path)?;
            bincode::deserialize(&bytes)?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = data.len(), "opened storage snapshot");
        Ok(Self { data, path: Some(path) })
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements storage Engine trait (byte-level operations)
impl Engine for MemoryEngine {
    type EngineIterator<'a> = MemoryEngineIterator<'a>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let value = self.data.get(&key).cloned();
        Ok(value)
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.data.remove(&key);
        Ok(())
    }

    fn scan(&mut self, range: impl std::ops::RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        MemoryEngineIterator {
            inner: self.data.range(range)
        }
    }

    fn flush(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        // Written beside the target, then renamed over it
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bincode::serialize(&self.data)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// In-memory storage engine iterator
pub struct MemoryEngineIterator<'a> {
    inner: btree_map::Range<'a, Vec<u8>, Vec<u8>>,
}

impl<'a> EngineIterator for MemoryEngineIterator<'a> {}

impl<'a> DoubleEndedIterator for MemoryEngineIterator<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Self::map)
    }
}

impl<'a> Iterator for MemoryEngineIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Self::map)
    }
}

impl<'a> MemoryEngineIterator<'a> {
    fn map(item: (&Vec<u8>, &Vec<u8>)) -> <MemoryEngineIterator<'a> as Iterator>::Item {
        let (k, v) = item;
        Ok((k.clone(), v.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryEngine;
    use crate::{error::Result, storage::engine::Engine};

    #[test]
    fn test_snapshot_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("data.db");

        let mut eng = MemoryEngine::open(&path)?;
        eng.set(b"k1".to_vec(), b"v1".to_vec())?;
        eng.flush()?;

        let mut reopened = MemoryEngine::open(&path)?;
        assert_eq!(reopened.get(b"k1".to_vec())?, Some(b"v1".to_vec()));
        Ok(())
    }
}
