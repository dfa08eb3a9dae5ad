//! Git index (staging area)
//!
//! The index records what goes into the next commit. It is loaded in full,
//! edited in memory and rewritten in full, always under `<index>.lock`.
//!
//! ## Data Structures
//!
//! - `entries`: staged files keyed by path, in byte order (the on-disk order)
//! - `children`: every directory that has staged files below it, mapped to
//!   those files' paths; used to resolve file/directory conflicts, never
//!   persisted

use crate::artifacts::core::lockfile::{LockError, Lockfile};
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry, is_complete,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::{CHECKSUM_SIZE, HEADER_SIZE, IndexError};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, ErrorKind, Read};
use std::path::Path;

#[derive(Debug)]
pub struct Index {
    path: Box<Path>,
    lockfile: Lockfile,
    entries: BTreeMap<String, IndexEntry>,
    children: BTreeMap<String, BTreeSet<String>>,
    /// Set by any mutation since the last load or write
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            lockfile: Lockfile::new(path.clone()),
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the index lock, then load the current contents.
    ///
    /// If loading fails the lock is released before the error is returned.
    pub fn load_for_update(&mut self) -> anyhow::Result<()> {
        self.lockfile.hold_for_update()?;

        if let Err(error) = self.load() {
            self.release_lock_after_failure();
            return Err(error);
        }

        Ok(())
    }

    /// Read the index from disk without locking it; a missing file is an
    /// empty index.
    pub fn load(&mut self) -> anyhow::Result<()> {
        self.clear();

        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(index = %self.path.display(), "no index file, starting empty");
                return Ok(());
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Unable to read index {}", self.path.display()));
            }
        };

        let (entries_count, entries_bytes) = Self::read_verified(&data)?;
        self.read_entries(&mut Cursor::new(entries_bytes), entries_count)?;

        tracing::debug!(entries = self.entries.len(), "loaded index");
        Ok(())
    }

    /// Validate the header and the trailing checksum over the whole file
    /// before any entry is decoded, returning the entry count and the raw
    /// entry bytes.
    fn read_verified(data: &[u8]) -> Result<(u32, Bytes), IndexError> {
        if data.len() < HEADER_SIZE + CHECKSUM_SIZE {
            return Err(IndexError::UnexpectedEof);
        }
        let entries_size = data.len() - HEADER_SIZE - CHECKSUM_SIZE;

        let mut reader = Checksum::new(Cursor::new(data));
        let header = IndexHeader::deserialize(Cursor::new(reader.read(HEADER_SIZE)?))
            .map_err(|error| IndexError::InvalidFormat(error.to_string()))?;
        header.validate()?;
        let entries_bytes = reader.read(entries_size)?;
        reader.verify()?;

        Ok((header.entries_count, entries_bytes))
    }

    fn read_entries(&mut self, reader: &mut impl Read, entries_count: u32) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = read_block(reader, ENTRY_MIN_SIZE)?;
            while !is_complete(&entry_bytes) {
                entry_bytes.extend_from_slice(&read_block(reader, ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(Cursor::new(entry_bytes))?;
            self.store_entry(entry);
        }

        Ok(())
    }

    /// Stage `path` with blob `oid`, replacing whatever it conflicts with.
    pub fn add(&mut self, path: &str, oid: ObjectId, metadata: EntryMetadata) {
        let entry = IndexEntry::create(path, oid, metadata);

        self.discard_conflicts(&entry);
        self.store_entry(entry);
        self.changed = true;
    }

    /// A file replaces any staged file at one of its ancestor directories,
    /// and any staged files below its own path.
    fn discard_conflicts(&mut self, entry: &IndexEntry) {
        for parent in entry.parent_dirs() {
            self.remove_entry(parent);
        }
        self.remove_children(&entry.path);
    }

    fn remove_children(&mut self, path: &str) {
        if let Some(children) = self.children.remove(path) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    fn remove_entry(&mut self, path: &str) {
        let Some(entry) = self.entries.remove(path) else {
            return;
        };
        tracing::debug!(path = %entry.path, "discarded conflicting index entry");

        for parent in entry.parent_dirs() {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(entry.path.clone());
        }

        self.entries.insert(entry.path.clone(), entry);
    }

    /// Persist the entries and release the lock.
    ///
    /// An unchanged index is not rewritten; the lock is rolled back instead.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.lockfile.is_held() {
            return Err(LockError::StaleLock(self.lockfile.lock_path().to_path_buf()).into());
        }

        if !self.changed {
            tracing::debug!("index unchanged, releasing lock");
            self.lockfile.rollback()?;
            return Ok(());
        }

        let written = self
            .write_entries()
            .and_then(|()| self.lockfile.commit().map_err(anyhow::Error::from));
        if let Err(error) = written {
            self.release_lock_after_failure();
            return Err(error);
        }
        self.changed = false;

        tracing::debug!(entries = self.entries.len(), "wrote index");
        Ok(())
    }

    fn write_entries(&mut self) -> anyhow::Result<()> {
        let entries_count =
            u32::try_from(self.entries.len()).context("Too many entries for the index")?;

        let mut writer = Checksum::new(&mut self.lockfile);
        writer.write(&IndexHeader::with_count(entries_count).serialize()?)?;
        for entry in self.entries.values() {
            writer.write(&entry.serialize()?)?;
        }
        writer.write_checksum()?;

        Ok(())
    }

    /// Roll back the lock if this index holds it.
    ///
    /// Every failure path after `load_for_update` must end here.
    pub fn release_lock(&mut self) -> anyhow::Result<()> {
        if self.lockfile.is_held() {
            self.lockfile.rollback()?;
        }

        Ok(())
    }

    /// Release the lock on an error path, keeping the original error
    /// for the caller; a failed rollback is only logged.
    pub fn release_lock_after_failure(&mut self) {
        if let Err(rollback_error) = self.release_lock() {
            tracing::warn!(error = %rollback_error, "failed to release index lock");
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn entry_by_path(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// Whether `path` is a staged file or a directory with staged files
    pub fn is_tracked(&self, path: &str) -> bool {
        self.entries.contains_key(path) || self.children.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = false;
    }
}

fn read_block(reader: &mut impl Read, size: usize) -> Result<Vec<u8>, IndexError> {
    let mut buffer = vec![0; size];
    reader.read_exact(&mut buffer).map_err(|error| match error.kind() {
        ErrorKind::UnexpectedEof => IndexError::UnexpectedEof,
        _ => IndexError::Io(error),
    })?;

    Ok(buffer)
}
