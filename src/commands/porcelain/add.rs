use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::objects::blob::Blob;
use anyhow::Context;
use std::path::Path;

impl Repository {
    /// Stage every file matched by `paths`.
    ///
    /// The index lock is released on every failure after it was taken.
    pub fn add(&self, paths: &[String]) -> anyhow::Result<()> {
        let mut index = self.index();
        index.load_for_update()?;

        let staged = self
            .expand_pathspecs(paths)
            .and_then(|files| {
                self.stage_files(&mut index, &files)
                    .context("adding files failed")
            });

        if let Err(error) = staged {
            index.release_lock_after_failure();
            return Err(error);
        }

        index.write_updates()
    }

    fn expand_pathspecs(&self, paths: &[String]) -> anyhow::Result<Vec<String>> {
        let mut files = Vec::new();
        for path in paths {
            files.extend(self.workspace().list_files(Path::new(path))?);
        }
        files.sort();
        files.dedup();

        Ok(files)
    }

    fn stage_files(&self, index: &mut Index, files: &[String]) -> anyhow::Result<()> {
        for file in files {
            let data = self.workspace().read_file(file)?;
            let stat = self.workspace().stat_file(file)?;

            let blob_id = self.database().store(&Blob::new(data))?;
            tracing::debug!(path = %file, oid = %blob_id, "staged file");

            index.add(file, blob_id, stat);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::areas::repository::Repository;
    use crate::areas::workspace::WorkspaceError;
    use crate::artifacts::core::lockfile::LockError;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn repository_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        dir.child("hello.txt").write_str("hello").unwrap();
        dir.child("src/lib.rs").write_str("world").unwrap();
        dir
    }

    fn open(dir: &TempDir) -> Repository {
        let repository = Repository::new(dir.path(), Box::new(std::io::sink())).unwrap();
        repository.init().unwrap();
        repository
    }

    fn staged_paths(dir: &TempDir) -> Vec<String> {
        let repository = open(dir);
        let mut index = repository.index();
        index.load().unwrap();
        index.entries().map(|entry| entry.path.clone()).collect()
    }

    #[rstest]
    fn directories_are_expanded_recursively(repository_dir: TempDir) {
        open(&repository_dir).add(&[".".to_string()]).unwrap();

        assert_eq!(staged_paths(&repository_dir), vec!["hello.txt", "src/lib.rs"]);
        assert!(!repository_dir.path().join(".git/index.lock").exists());
    }

    #[rstest]
    fn staged_blob_is_in_the_database(repository_dir: TempDir) {
        let repository = open(&repository_dir);

        repository.add(&["hello.txt".to_string()]).unwrap();

        let index = repository.index();
        let entry = index.entry_by_path("hello.txt").unwrap();
        assert_eq!(entry.oid.as_ref(), "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0");
        assert!(repository.database().exists(&entry.oid));
    }

    #[rstest]
    fn unmatched_pathspec_releases_the_lock(repository_dir: TempDir) {
        let repository = open(&repository_dir);

        let error = repository
            .add(&["hello.txt".to_string(), "missing.txt".to_string()])
            .unwrap_err();

        assert!(matches!(
            error.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::MissingFile(_))
        ));
        assert!(!repository_dir.path().join(".git/index.lock").exists());
        assert!(!repository_dir.path().join(".git/index").exists());
    }

    #[rstest]
    fn held_lock_is_reported_and_left_alone(repository_dir: TempDir) {
        let repository = open(&repository_dir);
        let lock_path = repository_dir.path().join(".git/index.lock");
        std::fs::write(&lock_path, "").unwrap();

        let error = repository.add(&["hello.txt".to_string()]).unwrap_err();

        assert!(matches!(
            error.downcast_ref::<LockError>(),
            Some(LockError::LockDenied(_))
        ));
        assert!(lock_path.exists());
    }

    #[rstest]
    fn adding_again_keeps_earlier_entries(repository_dir: TempDir) {
        open(&repository_dir).add(&["hello.txt".to_string()]).unwrap();
        open(&repository_dir).add(&["src".to_string()]).unwrap();

        assert_eq!(staged_paths(&repository_dir), vec!["hello.txt", "src/lib.rs"]);
    }
}
