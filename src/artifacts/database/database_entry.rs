use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use derive_new::new;

/// One child of a stored tree: the object it references and its mode
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct DatabaseEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl DatabaseEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }

    /// Kind of object the entry points at, derived from its mode
    pub fn object_type(&self) -> ObjectType {
        match self.is_tree() {
            true => ObjectType::Tree,
            false => ObjectType::Blob,
        }
    }
}
