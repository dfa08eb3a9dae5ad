use crate::areas::repository::Repository;
use crate::artifacts::objects::object::Object;
use std::io::Write;

impl Repository {
    /// Print the blob id of `object_path`, storing the blob when `write` is set.
    pub fn hash_object(&self, object_path: &str, write: bool) -> anyhow::Result<()> {
        let blob = self.workspace().parse_blob(object_path)?;

        let object_id = match write {
            true => self.database().store(&blob)?,
            false => blob.object_id()?,
        };

        writeln!(self.writer(), "{object_id}")?;

        Ok(())
    }
}
