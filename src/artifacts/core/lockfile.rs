//! Rename-based lockfile
//!
//! Guards a single target file against concurrent writers. Acquiring the lock
//! creates `<target>.lock` with an exclusive-create open, so exactly one
//! process wins the race. Writes go to the lock file only; `commit` renames it
//! over the target (the single moment the update becomes visible) and
//! `rollback` deletes it.
//!
//! Every caller that acquires a lock must call exactly one of `commit` or
//! `rollback` on every exit path. A leaked `.lock` file denies all future
//! acquirers until it is removed by hand.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Extension appended to the target path to form the lock path
pub const LOCK_EXTENSION: &str = "lock";

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Unable to create '{}': File exists.",
        .0.display()
    )]
    LockDenied(PathBuf),
    #[error("Unable to create '{}': parent directory is missing", .path.display())]
    MissingParent {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Unable to create '{}': Permission denied", .path.display())]
    NoPermission {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Not holding lock on file: {}", .0.display())]
    StaleLock(PathBuf),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Lockfile {
    file_path: Box<Path>,
    lock_path: Box<Path>,
    lock: Option<File>,
}

impl Lockfile {
    pub fn new(file_path: Box<Path>) -> Self {
        let lock_path = lock_path_for(&file_path).into_boxed_path();

        Lockfile {
            file_path,
            lock_path,
            lock: None,
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    pub fn is_held(&self) -> bool {
        self.lock.is_some()
    }

    /// Try once to take the lock; never blocks or retries.
    ///
    /// Calling this while the lock is already held by this handle is a no-op.
    pub fn hold_for_update(&mut self) -> Result<(), LockError> {
        if self.lock.is_some() {
            return Ok(());
        }

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.lock_path)
            .map_err(|error| match error.kind() {
                io::ErrorKind::AlreadyExists => LockError::LockDenied(self.lock_path.to_path_buf()),
                io::ErrorKind::NotFound => LockError::MissingParent {
                    path: self.lock_path.to_path_buf(),
                    source: error,
                },
                io::ErrorKind::PermissionDenied => LockError::NoPermission {
                    path: self.lock_path.to_path_buf(),
                    source: error,
                },
                _ => LockError::Io(error),
            })?;

        tracing::debug!(lock = %self.lock_path.display(), "acquired lock");
        self.lock = Some(file);

        Ok(())
    }

    pub fn write(&mut self, data: &[u8]) -> Result<(), LockError> {
        let lock = self.held_lock()?;
        lock.write_all(data)?;

        Ok(())
    }

    /// Publish the written bytes by renaming the lock over the target.
    ///
    /// The lock stays held until the rename succeeds, so a failed commit can
    /// still be rolled back.
    pub fn commit(&mut self) -> Result<(), LockError> {
        self.held_lock()?.sync_all()?;
        std::fs::rename(&self.lock_path, &self.file_path)?;
        self.lock = None;

        tracing::debug!(target_file = %self.file_path.display(), "committed lock");

        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), LockError> {
        let lock = self.take_lock()?;
        drop(lock);

        std::fs::remove_file(&self.lock_path)?;
        tracing::debug!(lock = %self.lock_path.display(), "rolled back lock");

        Ok(())
    }

    fn held_lock(&mut self) -> Result<&mut File, LockError> {
        match self.lock.as_mut() {
            Some(lock) => Ok(lock),
            None => Err(LockError::StaleLock(self.lock_path.to_path_buf())),
        }
    }

    fn take_lock(&mut self) -> Result<File, LockError> {
        self.lock
            .take()
            .ok_or_else(|| LockError::StaleLock(self.lock_path.to_path_buf()))
    }
}

impl Write for Lockfile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.held_lock().map_err(io::Error::other)?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.held_lock().map_err(io::Error::other)?.flush()
    }
}

fn lock_path_for(file_path: &Path) -> PathBuf {
    // `index` -> `index.lock`; an existing extension is kept, not replaced
    let mut lock_name = file_path.as_os_str().to_owned();
    lock_name.push(".");
    lock_name.push(LOCK_EXTENSION);

    PathBuf::from(lock_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    #[fixture]
    fn dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn lockfile(dir: &TempDir, name: &str) -> Lockfile {
        Lockfile::new(dir.path().join(name).into_boxed_path())
    }

    #[rstest]
    fn lock_path_is_adjacent_to_target(dir: TempDir) {
        let lockfile = lockfile(&dir, "HEAD");

        assert_eq!(lockfile.lock_path(), dir.path().join("HEAD.lock").as_path());
    }

    #[rstest]
    fn commit_replaces_target_with_written_bytes(dir: TempDir) {
        std::fs::write(dir.path().join("HEAD"), "old\n").unwrap();
        let mut lockfile = lockfile(&dir, "HEAD");

        lockfile.hold_for_update().unwrap();
        lockfile.write(b"new").unwrap();
        lockfile.write(b"\n").unwrap();

        // not visible until commit
        assert_eq!(std::fs::read_to_string(dir.path().join("HEAD")).unwrap(), "old\n");

        lockfile.commit().unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("HEAD")).unwrap(), "new\n");
        assert!(!dir.path().join("HEAD.lock").exists());
        assert!(!lockfile.is_held());
    }

    #[rstest]
    fn rollback_discards_writes(dir: TempDir) {
        std::fs::write(dir.path().join("index"), "kept").unwrap();
        let mut lockfile = lockfile(&dir, "index");

        lockfile.hold_for_update().unwrap();
        lockfile.write(b"discarded").unwrap();
        lockfile.rollback().unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("index")).unwrap(), "kept");
        assert!(!dir.path().join("index.lock").exists());
    }

    #[rstest]
    fn second_acquirer_is_denied_until_rollback(dir: TempDir) {
        let mut first = lockfile(&dir, "index");
        let mut second = lockfile(&dir, "index");

        first.hold_for_update().unwrap();
        let error = second.hold_for_update().unwrap_err();
        assert!(matches!(error, LockError::LockDenied(_)));

        first.rollback().unwrap();
        second.hold_for_update().unwrap();
        assert!(second.is_held());
        second.rollback().unwrap();
    }

    #[rstest]
    fn missing_parent_directory_is_reported(dir: TempDir) {
        let mut lockfile = lockfile(&dir, "missing/index");

        let error = lockfile.hold_for_update().unwrap_err();
        assert!(matches!(error, LockError::MissingParent { .. }));
    }

    #[rstest]
    fn read_only_directory_is_no_permission(dir: TempDir) {
        use std::os::unix::fs::PermissionsExt;
        let locked_dir = dir.path().join("readonly");
        std::fs::create_dir(&locked_dir).unwrap();
        std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o500)).unwrap();
        if std::fs::write(locked_dir.join("writable"), "").is_ok() {
            // permission bits are not enforced for this user
            return;
        }
        let mut lockfile = lockfile(&dir, "readonly/index");

        let error = lockfile.hold_for_update().unwrap_err();

        assert!(matches!(error, LockError::NoPermission { .. }));
        assert!(!lockfile.is_held());
        std::fs::set_permissions(&locked_dir, std::fs::Permissions::from_mode(0o700)).unwrap();
    }

    #[rstest]
    #[case::write(|lock: &mut Lockfile| lock.write(b"data"))]
    #[case::commit(|lock: &mut Lockfile| lock.commit())]
    #[case::rollback(|lock: &mut Lockfile| lock.rollback())]
    fn operations_without_a_held_lock_are_stale(
        dir: TempDir,
        #[case] operation: fn(&mut Lockfile) -> Result<(), LockError>,
    ) {
        let mut lockfile = lockfile(&dir, "index");

        let error = operation(&mut lockfile).unwrap_err();
        assert!(matches!(error, LockError::StaleLock(_)));
    }

    #[rstest]
    fn failed_commit_keeps_the_lock_for_rollback(dir: TempDir) {
        std::fs::create_dir_all(dir.path().join("HEAD/sub")).unwrap();
        let mut lockfile = lockfile(&dir, "HEAD");
        lockfile.hold_for_update().unwrap();
        lockfile.write(b"oid\n").unwrap();

        assert!(matches!(lockfile.commit(), Err(LockError::Io(_))));
        assert!(lockfile.is_held());

        lockfile.rollback().unwrap();
        assert!(!dir.path().join("HEAD.lock").exists());
        let mut next = self::lockfile(&dir, "HEAD");
        next.hold_for_update().unwrap();
        next.rollback().unwrap();
    }

    #[rstest]
    fn second_commit_is_stale(dir: TempDir) {
        let mut lockfile = lockfile(&dir, "HEAD");

        lockfile.hold_for_update().unwrap();
        lockfile.commit().unwrap();

        assert!(matches!(lockfile.commit(), Err(LockError::StaleLock(_))));
        assert!(matches!(lockfile.rollback(), Err(LockError::StaleLock(_))));
    }
}
