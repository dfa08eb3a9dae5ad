//! Porcelain commands (user-facing Git operations)
//!
//! - `init`: Initialize a new repository
//! - `add`: Stage files for commit
//! - `commit`: Create a new commit from the index

pub mod add;
pub mod commit;
pub mod init;
