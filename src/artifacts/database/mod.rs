//! Types read back from the object database
//!
//! A `DatabaseEntry` is a tree child referenced by oid, as opposed to a
//! subtree still being built from the index.

pub mod database_entry;
