//! The persistence codec (spec §4.6): exporting the cache's contents in a
//! stable, frequency-ordered sequence, writing/reading that sequence as a
//! versioned `bincode` stream, and bulk-reloading a freshly built cache.
//!
//! Frequencies are deliberately not persisted: a reloaded entry always
//! starts at frequency 1, as if freshly admitted. Only the `(key, value)`
//! pairs and their relative order survive a save/load round trip.

use super::cache::Cache;
use super::entry::Generation;
use crate::error::{CacheError, Result};

use std::collections::hash_map::BuildHasher;
use std::hash::Hash;
use std::io::{Read, Write};
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Current on-stream version marker. Bumped whenever the frame format
/// changes in a way that would misparse against an older reader.
const STREAM_VERSION: u32 = 5;

/// Which generations to include in an export, and in what combination.
/// Default is every generation (`all()`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationSelector {
    probation: bool,
    protected: bool,
    eden: bool,
}

impl GenerationSelector {
    /// Selects every generation (the usual choice for a full checkpoint).
    pub fn all() -> Self {
        Self {
            probation: true,
            protected: true,
            eden: true,
        }
    }

    /// Excludes `eden` from the export. Useful for snapshotting only
    /// entries that have survived at least one admission contest.
    pub fn without_eden(mut self) -> Self {
        self.eden = false;
        self
    }

    /// Excludes `probation` from the export.
    pub fn without_probation(mut self) -> Self {
        self.probation = false;
        self
    }

    /// Excludes `protected` from the export.
    pub fn without_protected(mut self) -> Self {
        self.protected = false;
        self
    }
}

impl Default for GenerationSelector {
    fn default() -> Self {
        Self::all()
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Builds the ordered export sequence used by both `write_to_stream`
    /// and any caller that wants the raw tuples. See spec §4.6: entries are
    /// concatenated probation → protected → eden (LRU to MRU within each),
    /// stable-sorted ascending by frequency, then optionally trimmed to
    /// `byte_limit` by keeping the highest-frequency suffix (re-reversed so
    /// the returned order stays ascending by frequency).
    pub fn items_to_write(
        &self,
        byte_limit: Option<u64>,
        which: GenerationSelector,
    ) -> Result<Vec<(Rc<K>, u64, u8)>> {
        let ring_total = self.eden.len() + self.probation.len() + self.protected.len();
        if ring_total != self.index.len() {
            log::warn!(
                "refusing to export: index holds {} entries but the generation rings hold {}",
                self.index.len(),
                ring_total
            );
            return Err(CacheError::CorruptedState {
                ring_total,
                index_total: self.index.len(),
            });
        }

        let mut entries: Vec<(Rc<K>, u64, u8)> = Vec::with_capacity(ring_total);
        if which.probation {
            self.probation.for_each_lru_to_mru(&self.slab, |node| {
                entries.push((Rc::clone(&node.key), node.weight, node.frequency));
            });
        }
        if which.protected {
            self.protected.for_each_lru_to_mru(&self.slab, |node| {
                entries.push((Rc::clone(&node.key), node.weight, node.frequency));
            });
        }
        if which.eden {
            self.eden.for_each_lru_to_mru(&self.slab, |node| {
                entries.push((Rc::clone(&node.key), node.weight, node.frequency));
            });
        }

        entries.sort_by(|a, b| a.2.cmp(&b.2));

        if let Some(limit) = byte_limit {
            if limit > 0 {
                let mut kept = Vec::new();
                let mut acc = 0u64;
                for entry in entries.into_iter().rev() {
                    if acc + entry.1 > limit && !kept.is_empty() {
                        break;
                    }
                    acc += entry.1;
                    kept.push(entry);
                }
                kept.reverse();
                entries = kept;
            }
        }

        Ok(entries)
    }

    /// Writes a version marker followed by one independently-decodable
    /// `(key, value)` frame per exported entry, in ascending-frequency
    /// order. Frequencies themselves are not written.
    pub fn write_to_stream<W: Write>(
        &self,
        writer: &mut W,
        byte_limit: Option<u64>,
        which: GenerationSelector,
    ) -> Result<usize>
    where
        K: Serialize,
        V: Serialize,
    {
        let entries = self.items_to_write(byte_limit, which)?;
        bincode::serialize_into(&mut *writer, &STREAM_VERSION)?;
        let mut written = 0;
        for (key, _weight, _frequency) in &entries {
            let idx = *self
                .index
                .get(key)
                .expect("export entry missing from index");
            let value = &self.slab.get(idx).value;
            bincode::serialize_into(&mut *writer, key.as_ref())?;
            bincode::serialize_into(&mut *writer, value)?;
            written += 1;
        }
        log::info!(
            "saved {written} cache entries ({} bytes budgeted)",
            byte_limit.map(|b| b.to_string()).unwrap_or_default()
        );
        Ok(written)
    }
}

impl<K, V, S> Cache<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Clone,
{
    /// Reads a version marker and a sequence of `(key, value)` frames,
    /// then admits them through the normal `set` cascade (spec §4.6's
    /// "bulk ingest", observably identical to one-by-one admission).
    ///
    /// If the cache is currently empty, frames are admitted in file order
    /// (the oldest-on-stream entry becomes the deepest LRU). If the cache
    /// already holds entries, keys already present are skipped and the
    /// remaining frames are admitted in reverse (most-recently-written
    /// first), so a reload never clobbers live, possibly-hotter state with
    /// stale frequency-1 values.
    pub fn read_from_stream<R: Read>(&mut self, reader: &mut R) -> Result<usize>
    where
        K: DeserializeOwned + Clone,
        V: DeserializeOwned + Clone,
    {
        let version: u32 = bincode::deserialize_from(&mut *reader)?;
        if version != STREAM_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: STREAM_VERSION,
                found: version,
            });
        }

        let mut frames = Vec::new();
        loop {
            let key: K = match bincode::deserialize_from(&mut *reader) {
                Ok(key) => key,
                Err(err) => match *err {
                    bincode::ErrorKind::Io(ref io_err)
                        if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
                    {
                        break
                    }
                    _ => return Err(CacheError::from(err)),
                },
            };
            let value: V = bincode::deserialize_from(&mut *reader)?;
            frames.push((key, value));
        }
        log::debug!("loaded {} candidate cache entries from stream", frames.len());

        let was_empty = self.is_empty();
        let items: Vec<(K, V)> = if was_empty {
            frames
        } else {
            frames
                .into_iter()
                .filter(|(key, _)| !self.index.contains_key(key))
                .rev()
                .collect()
        };

        let stored = self.bulk_admit(items)?;
        log::info!("admitted {stored} cache entries from stream");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::super::Cache;
    use super::GenerationSelector;

    #[test]
    fn round_trips_through_a_stream() {
        let mut cache = Cache::new(1_000);
        for i in 0..5 {
            cache.set(format!("k{i}"), format!("v{i}")).unwrap();
        }

        let mut buf = Vec::new();
        let written = cache
            .write_to_stream(&mut buf, None, GenerationSelector::all())
            .unwrap();
        assert_eq!(written, 5);

        let mut reloaded: Cache<String, String> = Cache::new(1_000);
        let mut cursor = std::io::Cursor::new(buf);
        let stored = reloaded.read_from_stream(&mut cursor).unwrap();
        assert_eq!(stored, 5);
        for i in 0..5 {
            assert!(reloaded.contains(&format!("k{i}")));
        }
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut buf = Vec::new();
        bincode::serialize_into(&mut buf, &999u32).unwrap();
        let mut reloaded: Cache<String, String> = Cache::new(1_000);
        let mut cursor = std::io::Cursor::new(buf);
        let err = reloaded.read_from_stream(&mut cursor).unwrap_err();
        match err {
            crate::error::CacheError::VersionMismatch { expected, found } => {
                assert_eq!(expected, 5);
                assert_eq!(found, 999);
            }
            other => panic!("expected VersionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn round_trips_through_an_on_disk_file() {
        let mut cache = Cache::new(1_000);
        for i in 0..5 {
            cache.set(format!("k{i}"), format!("v{i}")).unwrap();
        }

        let mut file = tempfile::tempfile().unwrap();
        let written = cache
            .write_to_stream(&mut file, None, GenerationSelector::all())
            .unwrap();
        assert_eq!(written, 5);

        use std::io::Seek;
        file.rewind().unwrap();

        let mut reloaded: Cache<String, String> = Cache::new(1_000);
        let stored = reloaded.read_from_stream(&mut file).unwrap();
        assert_eq!(stored, 5);
        for i in 0..5 {
            assert!(reloaded.contains(&format!("k{i}")));
        }
    }

    #[test]
    fn load_into_nonempty_cache_skips_existing_keys() {
        let mut source = Cache::new(1_000);
        source.set("a".to_string(), "1".to_string()).unwrap();
        source.set("b".to_string(), "2".to_string()).unwrap();
        let mut buf = Vec::new();
        source
            .write_to_stream(&mut buf, None, GenerationSelector::all())
            .unwrap();

        let mut target = Cache::new(1_000);
        target.set("a".to_string(), "already-here".to_string()).unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let stored = target.read_from_stream(&mut cursor).unwrap();
        assert_eq!(stored, 1);
        assert_eq!(
            target.get_and_touch(vec!["a".to_string()]).get("a"),
            Some(&"already-here".to_string())
        );
        assert!(target.contains(&"b".to_string()));
    }
}
