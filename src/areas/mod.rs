//! Core repository components
//!
//! - `database`: Object database for storing blobs, trees, and commits
//! - `index`: Staging area for tracking file changes
//! - `refs`: The HEAD reference
//! - `repository`: Ties the areas together for one working tree
//! - `workspace`: Working directory file system operations

pub mod database;
pub mod index;
pub mod refs;
pub mod repository;
pub mod workspace;
