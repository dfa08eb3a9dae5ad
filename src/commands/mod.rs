//! Git command implementations
//!
//! Commands are `Repository` methods, split the way Git splits them:
//!
//! - `plumbing`: Low-level commands for direct object manipulation
//! - `porcelain`: User-facing commands for version control workflows

pub mod plumbing;
pub mod porcelain;
