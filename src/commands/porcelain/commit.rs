use crate::areas::repository::Repository;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use std::io::Write;

impl Repository {
    /// Commit the staged tree, authored by the `GIT_AUTHOR_*` environment.
    pub fn commit(&self, message: &str) -> anyhow::Result<ObjectId> {
        let author = Author::load_from_env()?;
        self.commit_as(message, author)
    }

    pub fn commit_as(&self, message: &str, author: Author) -> anyhow::Result<ObjectId> {
        let message = message.trim();
        if message.is_empty() {
            anyhow::bail!("Aborting commit due to empty commit message.");
        }

        let tree_id = self.write_tree()?;
        let parent = self.refs().read_head()?;
        let commit = Commit::new(parent, tree_id, author, format!("{message}\n"));
        let commit_id = self.database().store(&commit)?;
        self.refs().update_head(&commit_id)?;

        let root_marker = if commit.is_root() { "(root-commit) " } else { "" };
        writeln!(
            self.writer(),
            "[{}{}] {}",
            root_marker,
            commit_id.to_short_oid(),
            commit.short_message()
        )?;

        Ok(commit_id)
    }

    /// Store the index as a tree; subtrees are stored before their parents.
    fn write_tree(&self) -> anyhow::Result<ObjectId> {
        let mut index = self.index();
        index.load()?;

        let tree = Tree::build(index.entries())?;
        tree.traverse(&mut |tree: &Tree| {
            self.database().store(tree)?;
            Ok(())
        })?;

        tree.object_id()
    }
}
