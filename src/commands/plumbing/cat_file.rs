use crate::areas::repository::Repository;
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use std::io::Write;

impl Repository {
    /// Pretty-print a stored object the way `git cat-file -p` does.
    pub fn cat_file(&self, object_id: &str) -> anyhow::Result<()> {
        let object_id = ObjectId::try_parse(object_id)?;
        let object = self.database().parse_object(&object_id)?;

        let mut writer = self.writer();
        match object {
            ObjectBox::Blob(blob) => writer.write_all(blob.content())?,
            // commit payloads already end with the message's newline
            ObjectBox::Commit(commit) => writer.write_all(commit.display().as_bytes())?,
            ObjectBox::Tree(tree) if tree.is_empty() => {}
            ObjectBox::Tree(tree) => writeln!(writer, "{}", tree.display())?,
        }

        Ok(())
    }
}
