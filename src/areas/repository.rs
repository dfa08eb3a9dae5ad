use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::path::Path;

/// Name of the directory holding repository data inside the working tree
pub const GIT_DIR: &str = ".git";

/// Object database directory, inside `GIT_DIR`
pub const OBJECTS_DIR: &str = "objects";

/// Staging index file, inside `GIT_DIR`
pub const INDEX_FILE: &str = "index";

pub struct Repository {
    path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: RefCell<Index>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open the repository rooted at `path`, creating the directory if needed.
    ///
    /// Command output goes to `writer`.
    pub fn new(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("Unable to create directory {}", path.display()))?;
        }
        let path = path
            .canonicalize()
            .with_context(|| format!("Unable to resolve {}", path.display()))?;
        let git_path = path.join(GIT_DIR);

        Ok(Repository {
            index: RefCell::new(Index::new(git_path.join(INDEX_FILE).into_boxed_path())),
            database: Database::new(git_path.join(OBJECTS_DIR).into_boxed_path()),
            workspace: Workspace::new(path.clone().into_boxed_path()),
            refs: Refs::new(git_path.into_boxed_path()),
            writer: RefCell::new(writer),
            path: path.into_boxed_path(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> Box<Path> {
        self.path.join(GIT_DIR).into_boxed_path()
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&'_ self) -> RefMut<'_, Index> {
        self.index.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }
}
