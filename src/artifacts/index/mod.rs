//! Git index file format
//!
//! The index (also called staging area or cache) records what will go into
//! the next commit, independently of both the working tree and the last commit.
//!
//! ## File Format (Version 2)
//!
//! ```text
//! Header (12 bytes):
//!   - Signature: "DIRC" (4 bytes)
//!   - Version: 2 (4 bytes, big-endian)
//!   - Entry count (4 bytes, big-endian)
//!
//! Entries (variable length, sorted by path):
//!   - Ten 32-bit big-endian stat fields, 20-byte oid, 16-bit flags
//!   - Null-terminated path, null-padded to 8-byte alignment
//!
//! Checksum (20 bytes):
//!   - SHA-1 hash of all preceding bytes
//! ```

pub mod checksum;
pub mod entry_mode;
pub mod index_entry;
pub mod index_header;

/// Size of SHA-1 checksum in bytes
pub const CHECKSUM_SIZE: usize = 20;

/// Size of index header in bytes
pub const HEADER_SIZE: usize = 12; // 4 bytes for marker, 4 for version, 4 for entries_count

/// Magic signature identifying index files
pub const SIGNATURE: &str = "DIRC";

/// Index file format version
pub const VERSION: u32 = 2;

/// Failures reading the on-disk index
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// Signature, version or checksum mismatch, or an undecodable entry
    #[error("invalid index file: {0}")]
    InvalidFormat(String),
    /// The file ended before the announced content was read
    #[error("Unexpected end-of-file while reading index")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
