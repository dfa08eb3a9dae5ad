//! HEAD reference
//!
//! `HEAD` holds the 40-character hex oid of the current commit followed by a
//! newline. It is only ever rewritten through its lockfile, so concurrent
//! committers cannot interleave partial writes.

use crate::artifacts::core::lockfile::Lockfile;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use std::io::ErrorKind;
use std::path::Path;

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";

#[derive(Debug, new)]
pub struct Refs {
    /// Path to the git directory (typically `.git`)
    path: Box<Path>,
}

impl Refs {
    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    /// Current commit, or `None` before the first commit
    pub fn read_head(&self) -> anyhow::Result<Option<ObjectId>> {
        let head_path = self.head_path();

        let content = match std::fs::read_to_string(&head_path) {
            Ok(content) => content,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("Unable to read {}", head_path.display()));
            }
        };

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        Ok(Some(ObjectId::try_parse(content)?))
    }

    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let mut lockfile = Lockfile::new(self.head_path());
        lockfile.hold_for_update()?;

        let written = lockfile
            .write(format!("{oid}\n").as_bytes())
            .and_then(|()| lockfile.commit());
        if let Err(error) = written {
            if let Err(rollback_error) = lockfile.rollback() {
                tracing::warn!(error = %rollback_error, "failed to release HEAD lock");
            }
            return Err(error.into());
        }

        tracing::debug!(%oid, "updated HEAD");
        Ok(())
    }
}
