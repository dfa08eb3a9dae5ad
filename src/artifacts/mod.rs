//! Git data structures and codecs
//!
//! This module contains the value types the repository areas operate on:
//!
//! - `core`: Shared mechanisms (the lockfile protocol)
//! - `database`: Database entry types
//! - `index`: Index/staging area binary format
//! - `objects`: Git object types (blob, tree, commit)

pub mod core;
pub mod database;
pub mod index;
pub mod objects;
