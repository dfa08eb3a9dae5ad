//! Working tree access
//!
//! Paths handed out by the workspace are relative to the repository root and
//! `/`-separated, the form used as index keys and tree entry names.

use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use anyhow::Context;
use bytes::Bytes;
use std::io;
use std::path::{Component, Path};
use walkdir::WalkDir;

/// Directory names never listed from the working tree
const IGNORED_DIRS: [&str; 1] = [".git"];

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("pathspec '{0}' did not match any files")]
    MissingFile(String),
    /// Operation (`open`, `stat`) and path that were refused
    #[error("{0}('{1}'): Permission denied")]
    NoPermission(&'static str, String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every file at or below `path`, sorted, as root-relative keys.
    ///
    /// `path` is taken relative to the workspace root unless absolute.
    pub fn list_files(&self, path: &Path) -> anyhow::Result<Vec<String>> {
        let path = self.path.join(path);
        let relative = self.relative_key(&path)?;

        if path.is_dir() {
            let mut files = Vec::new();
            let walker = WalkDir::new(&path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !Self::is_ignored(entry.file_name()));

            for entry in walker {
                let entry = entry
                    .with_context(|| format!("Unable to list files in {}", path.display()))?;
                if !entry.file_type().is_dir() {
                    files.push(self.relative_key(entry.path())?);
                }
            }

            Ok(files)
        } else if path.symlink_metadata().is_ok() {
            Ok(vec![relative])
        } else {
            Err(WorkspaceError::MissingFile(relative).into())
        }
    }

    pub fn read_file(&self, file_path: &str) -> anyhow::Result<Bytes> {
        let content = std::fs::read(self.path.join(file_path))
            .map_err(|error| Self::map_io_error(error, "open", file_path))?;

        Ok(Bytes::from(content))
    }

    pub fn stat_file(&self, file_path: &str) -> anyhow::Result<EntryMetadata> {
        // executable detection needs the real location, not the key
        let full_path = self.path.join(file_path);
        let metadata = std::fs::metadata(&full_path)
            .map_err(|error| Self::map_io_error(error, "stat", file_path))?;

        (full_path.as_path(), metadata).try_into()
    }

    pub fn parse_blob(&self, file_path: &str) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    fn is_ignored(name: &std::ffi::OsStr) -> bool {
        IGNORED_DIRS.iter().any(|ignored| name == *ignored)
    }

    fn relative_key(&self, path: &Path) -> anyhow::Result<String> {
        let relative = path.strip_prefix(&self.path).with_context(|| {
            format!(
                "{} is outside repository at {}",
                path.display(),
                self.path.display()
            )
        })?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(
                    part.to_str()
                        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))?,
                ),
                Component::CurDir => {}
                _ => anyhow::bail!("Unsupported path: {}", path.display()),
            }
        }

        Ok(parts.join("/"))
    }

    fn map_io_error(error: io::Error, operation: &'static str, file_path: &str) -> anyhow::Error {
        match error.kind() {
            io::ErrorKind::PermissionDenied => {
                WorkspaceError::NoPermission(operation, file_path.to_string()).into()
            }
            _ => anyhow::Error::new(WorkspaceError::Io(error))
                .context(format!("Unable to {operation} {file_path}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn workspace_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        dir.child("b.txt").write_str("b").unwrap();
        dir.child("a/z.txt").write_str("z").unwrap();
        dir.child("a/c/d.txt").write_str("d").unwrap();
        dir.child(".git/HEAD").write_str("ignored").unwrap();
        dir
    }

    fn workspace(dir: &TempDir) -> Workspace {
        Workspace::new(dir.path().into())
    }

    #[rstest]
    fn root_listing_is_sorted_and_skips_git_dir(workspace_dir: TempDir) {
        let files = workspace(&workspace_dir).list_files(Path::new(".")).unwrap();

        assert_eq!(files, vec!["a/c/d.txt", "a/z.txt", "b.txt"]);
    }

    #[rstest]
    fn subdirectory_listing_keeps_root_relative_keys(workspace_dir: TempDir) {
        let files = workspace(&workspace_dir)
            .list_files(&workspace_dir.path().join("a/c"))
            .unwrap();

        assert_eq!(files, vec!["a/c/d.txt"]);
    }

    #[rstest]
    fn single_file_lists_itself(workspace_dir: TempDir) {
        let files = workspace(&workspace_dir)
            .list_files(Path::new("./b.txt"))
            .unwrap();

        assert_eq!(files, vec!["b.txt"]);
    }

    #[rstest]
    fn unmatched_pathspec_is_missing_file(workspace_dir: TempDir) {
        let error = workspace(&workspace_dir)
            .list_files(Path::new("nope.txt"))
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "pathspec 'nope.txt' did not match any files"
        );
        assert!(matches!(
            error.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::MissingFile(_))
        ));
    }

    #[rstest]
    fn unreadable_file_is_no_permission(workspace_dir: TempDir) {
        use std::os::unix::fs::PermissionsExt;
        let path = workspace_dir.child("b.txt").path().to_path_buf();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();
        if std::fs::read(&path).is_ok() {
            // permission bits are not enforced for this user
            return;
        }

        let error = workspace(&workspace_dir).read_file("b.txt").unwrap_err();

        assert_eq!(error.to_string(), "open('b.txt'): Permission denied");
        assert!(matches!(
            error.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::NoPermission("open", _))
        ));
    }

    #[rstest]
    fn read_file_returns_raw_bytes(workspace_dir: TempDir) {
        workspace_dir.child("bin.dat").write_binary(&[0, 255, 10]).unwrap();

        let content = workspace(&workspace_dir).read_file("bin.dat").unwrap();

        assert_eq!(&content[..], &[0, 255, 10]);
    }

    #[rstest]
    fn stat_file_sees_the_executable_bit(workspace_dir: TempDir) {
        use std::os::unix::fs::PermissionsExt;
        let script = workspace_dir.child("run.sh");
        script.write_str("#!/bin/sh\n").unwrap();
        std::fs::set_permissions(script.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        let workspace = workspace(&workspace_dir);

        assert!(workspace.stat_file("run.sh").unwrap().is_executable());
        assert!(!workspace.stat_file("b.txt").unwrap().is_executable());
        assert_eq!(workspace.stat_file("b.txt").unwrap().size, 1);
    }
}
