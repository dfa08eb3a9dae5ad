//! Plumbing commands (low-level Git operations)
//!
//! - `hash-object`: Compute a blob's object ID and optionally store it
//! - `cat-file`: Print a stored object

pub mod cat_file;
pub mod hash_object;
