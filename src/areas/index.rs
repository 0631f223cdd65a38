//! Index (staging area)
//!
//! Tracks which blob is staged for each path. The whole file is read on load
//! and rewritten on every persisted change.
//!
//! ## Index File Format
//!
//! - Header: Signature, version, and entry count
//! - Entries: Sorted list of tracked files with metadata
//! - Checksum: SHA-1 hash of the entire index for integrity verification

use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{ENTRY_BLOCK, ENTRY_MIN_SIZE, IndexEntry};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::errors::Error;
use anyhow::Context;
use bytes::Bytes;
use file_guard::Lock;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (typically `.git/index`)
    path: Box<Path>,
    /// Tracked files keyed by `/`-separated path; `String` ordering is byte ordering
    entries: BTreeMap<String, IndexEntry>,
    /// Set when entries differ from what is on disk
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the index from disk
    ///
    /// A missing or empty file yields an empty index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.changed = false;

        let content = match std::fs::read(self.path()) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).context(format!("Unable to read index {}", self.path.display()));
            }
        };

        if content.is_empty() {
            return Ok(());
        }

        for entry in Self::parse(&content)? {
            self.entries.insert(entry.path.clone(), entry);
        }
        tracing::debug!(entries = self.entries.len(), "index loaded");

        Ok(())
    }

    /// Decode a complete index file, verifying its trailing checksum
    pub fn parse(content: &[u8]) -> anyhow::Result<Vec<IndexEntry>> {
        let mut reader = Checksum::new(content);

        let header = IndexHeader::deserialize(&reader.read(HEADER_SIZE)?)?;

        // the count is untrusted until the checksum is verified
        let capacity = (header.entries_count as usize).min(content.len() / ENTRY_MIN_SIZE);
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..header.entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            // every entry ends with at least one NUL on an 8-byte boundary
            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            entries.push(IndexEntry::deserialize(&entry_bytes)?);
        }

        reader.verify()?;

        if entries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(Error::corrupt_index("entries are not sorted by path").into());
        }

        Ok(entries)
    }

    /// Encode entries as a complete index file, checksum included
    pub fn encode<'e>(entries: impl ExactSizeIterator<Item = &'e IndexEntry>) -> anyhow::Result<Bytes> {
        let mut writer = Checksum::new(Vec::new());

        writer.write(&IndexHeader::for_entries(entries.len() as u32).serialize()?)?;
        for entry in entries {
            writer.write(&entry.serialize()?)?;
        }
        writer.write_checksum()?;

        Ok(Bytes::from(writer.into_inner()))
    }

    pub fn entry_by_path(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Insert or replace the record for `entry.path`
    ///
    /// Records that would clash with the new one in a tree (a file where a
    /// parent directory now is, or files below a path that is now a file) are
    /// dropped.
    pub fn upsert(&mut self, entry: IndexEntry) {
        self.discard_conflicts(&entry.path);
        self.entries.insert(entry.path.clone(), entry);
        self.changed = true;
    }

    /// Drop the record for `path`, if any
    pub fn remove(&mut self, path: &str) {
        if self.entries.remove(path).is_some() {
            self.changed = true;
        }
    }

    fn discard_conflicts(&mut self, path: &str) {
        let mut parent = path;
        while let Some((dir, _)) = parent.rsplit_once('/') {
            if self.entries.remove(dir).is_some() {
                self.changed = true;
            }
            parent = dir;
        }

        let prefix = format!("{path}/");
        let children = self
            .entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        for child in children {
            self.entries.remove(&child);
            self.changed = true;
        }
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn paths(&self) -> BTreeSet<String> {
        self.entries.keys().cloned().collect()
    }

    /// Paths at or below `dir` (`""` or `"."` meaning everything)
    pub fn paths_under(&self, dir: &str) -> Vec<String> {
        if dir.is_empty() || dir == "." {
            return self.entries.keys().cloned().collect();
        }

        let prefix = format!("{dir}/");
        self.entries
            .keys()
            .filter(|path| path.as_str() == dir || path.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Persist the index if it changed since it was loaded
    ///
    /// The new content is written to `index.lock` under an exclusive lock
    /// and renamed over the index, so readers never see a partial file.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.changed {
            return Ok(());
        }

        let content = Self::encode(self.entries.values())?;
        let lock_path = self.path.with_extension("lock");

        let mut lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
            .with_context(|| format!("Unable to create index lock {}", lock_path.display()))?;

        let published = (|| -> anyhow::Result<()> {
            {
                let mut lock = file_guard::lock(&mut lock_file, Lock::Exclusive, 0, 1)?;
                lock.deref_mut().write_all(&content)?;
            }
            std::fs::rename(&lock_path, self.path())
                .with_context(|| format!("Unable to replace index {}", self.path.display()))
        })();

        if let Err(err) = published {
            if let Err(cleanup) = std::fs::remove_file(&lock_path) {
                tracing::warn!(%cleanup, lock = %lock_path.display(), "index lock left behind");
            }
            return Err(err);
        }

        self.changed = false;
        tracing::debug!(entries = self.entries.len(), "index written");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::index_entry::EntryMetadata;
    use crate::artifacts::objects::object::hash_object;
    use crate::artifacts::objects::object_type::ObjectType;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn entry(path: &str) -> IndexEntry {
        let oid = hash_object(ObjectType::Blob, path.as_bytes()).unwrap();
        IndexEntry::new(path.to_string(), oid, EntryMetadata::with_size(path.len() as u32))
    }

    fn index_in(dir: &assert_fs::TempDir) -> Index {
        Index::new(dir.path().join("index").into_boxed_path())
    }

    fn corrupt_kind(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<Error>(),
            Some(Error::CorruptIndex { .. })
        )
    }

    #[test]
    fn missing_and_empty_files_load_as_empty() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);

        index.rehydrate().unwrap();
        assert!(index.is_empty());

        std::fs::write(index.path(), b"").unwrap();
        index.rehydrate().unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn persisted_entries_are_sorted_and_reloaded() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);
        index.upsert(entry("b.txt"));
        index.upsert(entry("a/z.txt"));
        index.upsert(entry("a.txt"));
        index.write_updates().unwrap();

        let mut reloaded = index_in(&dir);
        reloaded.rehydrate().unwrap();

        let paths = reloaded.entries().map(|e| e.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, vec!["a.txt", "a/z.txt", "b.txt"]);
        assert!(!dir.path().join("index.lock").exists());
    }

    #[test]
    fn upsert_replaces_and_remove_is_idempotent() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);

        index.upsert(entry("a.txt"));
        let mut replacement = entry("other");
        replacement.path = "a.txt".to_string();
        index.upsert(replacement.clone());

        assert_eq!(index.len(), 1);
        assert_eq!(index.entry_by_path("a.txt"), Some(&replacement));

        index.remove("a.txt");
        index.remove("a.txt");
        assert!(index.is_empty());
    }

    #[test]
    fn files_and_directories_do_not_coexist() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);

        index.upsert(entry("nested/a.txt"));
        index.upsert(entry("nested/deeper/b.txt"));
        index.upsert(entry("nested"));
        assert_eq!(index.paths(), BTreeSet::from(["nested".to_string()]));

        index.upsert(entry("nested/c.txt"));
        assert_eq!(index.paths(), BTreeSet::from(["nested/c.txt".to_string()]));
    }

    #[test]
    fn paths_under_a_directory() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);
        for path in ["a/1", "a/b/2", "ab", "c"] {
            index.upsert(entry(path));
        }

        assert_eq!(index.paths_under("a"), vec!["a/1", "a/b/2"]);
        assert_eq!(index.paths_under(".").len(), 4);
    }

    #[test]
    fn flipped_byte_fails_the_checksum() {
        let mut content = Index::encode([entry("a.txt")].iter()).unwrap().to_vec();
        content[HEADER_SIZE + 2] ^= 0xff;

        let err = Index::parse(&content).unwrap_err();

        assert!(corrupt_kind(&err));
    }

    #[test]
    fn bad_signature_and_truncation_are_corrupt() {
        let content = Index::encode([entry("a.txt")].iter()).unwrap().to_vec();

        let mut bad_signature = content.clone();
        bad_signature[0] = b'X';
        assert!(corrupt_kind(&Index::parse(&bad_signature).unwrap_err()));

        assert!(corrupt_kind(&Index::parse(&content[..content.len() - 30]).unwrap_err()));
    }

    #[test]
    fn entry_count_beyond_the_file_is_corrupt() {
        let mut content = b"DIRC\0\0\0\x02\xff\xff\xff\xff".to_vec();
        content.extend_from_slice(&[0u8; 20]);

        let err = Index::parse(&content).unwrap_err();

        assert!(corrupt_kind(&err));
    }

    #[test]
    fn failed_write_does_not_leave_the_lock_behind() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut index = index_in(&dir);
        index.upsert(entry("a.txt"));
        // a non-empty directory where the index should go makes the rename fail
        std::fs::create_dir_all(dir.path().join("index/occupied")).unwrap();

        assert!(index.write_updates().is_err());
        assert!(!dir.path().join("index.lock").exists());

        std::fs::remove_dir_all(dir.path().join("index")).unwrap();
        index.write_updates().unwrap();
        assert!(dir.path().join("index").is_file());
    }

    proptest! {
        #[test]
        fn parse_reverses_encode(
            paths in proptest::collection::btree_set("[a-z]{1,8}(/[a-z0-9._]{1,12}){0,2}", 0..24)
        ) {
            let entries = paths.iter().map(|p| entry(p)).collect::<Vec<_>>();

            let decoded = Index::parse(&Index::encode(entries.iter()).unwrap()).unwrap();

            prop_assert_eq!(decoded, entries);
        }
    }
}
