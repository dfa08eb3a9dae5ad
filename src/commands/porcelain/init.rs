use crate::areas::repository::Repository;
use anyhow::Context;
use std::fs;
use std::io::Write;

/// Directory for references, inside the git directory
const REFS_DIR: &str = "refs";

impl Repository {
    pub fn init(&self) -> anyhow::Result<()> {
        fs::create_dir_all(self.database().objects_path())
            .context("Failed to create .git/objects directory")?;

        fs::create_dir_all(self.git_path().join(REFS_DIR))
            .context("Failed to create .git/refs directory")?;

        writeln!(
            self.writer(),
            "Initialized empty Git repository in {}",
            self.git_path().display()
        )?;

        Ok(())
    }
}
