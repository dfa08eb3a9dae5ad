//! Index entry representation
//!
//! Each entry in the index represents a staged file with:
//! - File path, relative to the repository root, `/`-separated
//! - Content hash (blob object ID)
//! - File stat metadata (mode, size, timestamps, device/inode, owner)
//!
//! ## Entry Format
//!
//! Ten 32-bit big-endian integers (ctime, ctime nsec, mtime, mtime nsec, dev,
//! ino, mode, uid, gid, size), 20 raw oid bytes, a 16-bit flags field holding
//! the path length, then the null-terminated path, padded with nulls to a
//! multiple of 8 bytes.

use crate::artifacts::index::IndexError;
use crate::artifacts::index::entry_mode::{EntryMode, FileMode};
use crate::artifacts::objects::object::{Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use is_executable::IsExecutable;
use std::fs::Metadata;
use std::io::{BufRead, Write};
use std::os::unix::prelude::MetadataExt;
use std::path::Path;

/// Largest path length representable in the flags field
pub const MAX_PATH_SIZE: usize = 0xfff;

/// Block size for entry alignment (8 bytes)
pub const ENTRY_BLOCK: usize = 8;

/// Minimum size of an index entry in bytes
pub const ENTRY_MIN_SIZE: usize = 64;

/// Byte offset of the path within a serialized entry
const PATH_OFFSET: usize = 62;

/// A staged file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Path relative to repository root, `/`-separated
    pub path: String,
    /// Blob object ID of the staged content
    pub oid: ObjectId,
    pub metadata: EntryMetadata,
    /// Path byte length, capped at `MAX_PATH_SIZE`
    pub flags: u16,
}

impl IndexEntry {
    pub fn create(path: impl Into<String>, oid: ObjectId, metadata: EntryMetadata) -> Self {
        let path = path.into();
        let flags = path.len().min(MAX_PATH_SIZE) as u16;

        IndexEntry {
            path,
            oid,
            metadata,
            flags,
        }
    }

    pub fn basename(&self) -> &str {
        self.path
            .rsplit_once('/')
            .map_or(self.path.as_str(), |(_, name)| name)
    }

    /// Ancestor directories, root first: `a/b/c` yields `["a", "a/b"]`.
    pub fn parent_dirs(&self) -> Vec<&str> {
        parent_dirs(&self.path)
    }

    pub fn mode(&self) -> EntryMode {
        self.metadata.mode
    }
}

pub(crate) fn parent_dirs(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .map(|(position, _)| &path[..position])
        .collect()
}

/// File stat captured when the file was staged
///
/// Timestamps keep nanosecond precision so that status checks can detect
/// changes without rereading file content.
#[derive(Debug, Clone, Default, PartialEq, Eq, new)]
pub struct EntryMetadata {
    /// Change time (seconds since Unix epoch)
    pub ctime: i64,
    pub ctime_nsec: i64,
    /// Modification time (seconds since Unix epoch)
    pub mtime: i64,
    pub mtime_nsec: i64,
    pub dev: u64,
    pub ino: u64,
    pub mode: EntryMode,
    pub uid: u32,
    pub gid: u32,
    /// File size in bytes
    pub size: u64,
}

impl EntryMetadata {
    pub fn is_executable(&self) -> bool {
        self.mode == EntryMode::File(FileMode::Executable)
    }
}

impl Packable for IndexEntry {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let metadata = &self.metadata;

        // the on-disk fields are 32 bits wide; larger values are truncated like git does
        let mut entry_bytes = Vec::with_capacity(ENTRY_MIN_SIZE + self.path.len());
        entry_bytes.write_u32::<NetworkEndian>(metadata.ctime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.ctime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.mtime as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.mtime_nsec as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.dev as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.ino as u32)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.mode.as_u32())?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.uid)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.gid)?;
        entry_bytes.write_u32::<NetworkEndian>(metadata.size as u32)?;
        self.oid.write_h40_to(&mut entry_bytes)?;
        entry_bytes.write_u16::<NetworkEndian>(self.flags)?;
        entry_bytes.write_all(self.path.as_bytes())?;

        // at least one null terminator, then pad to the block size
        entry_bytes.push(0);
        while entry_bytes.len() % ENTRY_BLOCK != 0 {
            entry_bytes.push(0);
        }

        Ok(Bytes::from(entry_bytes))
    }
}

impl Unpackable for IndexEntry {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut fields = [0u32; 10];
        reader.read_u32_into::<NetworkEndian>(&mut fields)?;
        let [
            ctime,
            ctime_nsec,
            mtime,
            mtime_nsec,
            dev,
            ino,
            mode,
            uid,
            gid,
            size,
        ] = fields;

        let oid = ObjectId::read_h40_from(&mut reader)?;
        let flags = reader.read_u16::<NetworkEndian>()?;

        let mut path_bytes = Vec::new();
        reader.read_until(0, &mut path_bytes)?;
        if path_bytes.pop() != Some(0) {
            return Err(IndexError::InvalidFormat("missing null terminator in entry path".into()).into());
        }
        let path = String::from_utf8(path_bytes)
            .map_err(|_| IndexError::InvalidFormat("entry path is not valid UTF-8".into()))?;

        Ok(IndexEntry {
            path,
            oid,
            metadata: EntryMetadata {
                ctime: ctime as i64,
                ctime_nsec: ctime_nsec as i64,
                mtime: mtime as i64,
                mtime_nsec: mtime_nsec as i64,
                dev: dev as u64,
                ino: ino as u64,
                mode: EntryMode::try_from(mode)?,
                uid,
                gid,
                size: size as u64,
            },
            flags,
        })
    }
}

/// Whether a partially read entry already contains its path terminator.
///
/// Entries are read a block at a time; once the last byte read is null the
/// path and its padding are complete.
pub fn is_complete(entry_bytes: &[u8]) -> bool {
    entry_bytes.len() > PATH_OFFSET && entry_bytes.last() == Some(&0)
}

impl TryFrom<(&Path, Metadata)> for EntryMetadata {
    type Error = anyhow::Error;

    fn try_from((file_path, metadata): (&Path, Metadata)) -> Result<Self, Self::Error> {
        let mode = if metadata.is_dir() {
            EntryMode::Directory
        } else {
            FileMode::from(file_path.is_executable()).into()
        };

        Ok(Self {
            ctime: metadata.ctime(),
            ctime_nsec: metadata.ctime_nsec(),
            mtime: metadata.mtime(),
            mtime_nsec: metadata.mtime_nsec(),
            dev: metadata.dev(),
            ino: metadata.ino(),
            mode,
            uid: metadata.uid(),
            gid: metadata.gid(),
            size: metadata.size(),
        })
    }
}
