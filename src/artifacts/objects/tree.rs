//! Git tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs)
//! and subdirectories (other trees), along with their names and modes.
//!
//! ## Format
//!
//! Each entry: `<octal mode> <name>\0<20-byte raw oid>`, concatenated with no
//! separator.
//!
//! ## Tree Building
//!
//! `Tree::build` turns the flat, path-keyed list of index entries into nested
//! trees, one per directory. Directory keys carry a trailing `/` so that the
//! ordered map sorts them the way Git does (`a.txt` < `a/` < `a0`).

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::{Object, Packable, Unpackable, hash_framed};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use anyhow::Context;
use bytes::Bytes;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

#[derive(Debug, Clone)]
enum TreeEntry {
    /// Referenced by oid: a staged file, or a subtree read back from the database
    Stored(DatabaseEntry),
    /// Subtree built from the index, not yet stored
    Directory(Tree),
}

impl TreeEntry {
    fn mode(&self) -> EntryMode {
        match self {
            TreeEntry::Stored(entry) => entry.mode,
            TreeEntry::Directory(_) => EntryMode::Directory,
        }
    }

    fn oid(&self) -> anyhow::Result<ObjectId> {
        match self {
            TreeEntry::Stored(entry) => Ok(entry.oid.clone()),
            TreeEntry::Directory(tree) => tree.object_id(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
    oid: OnceCell<ObjectId>,
}

impl Tree {
    /// Build the root tree from staged entries.
    ///
    /// The result depends only on the set of entries, not on their order.
    pub fn build<'e>(entries: impl IntoIterator<Item = &'e IndexEntry>) -> anyhow::Result<Self> {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut root = Self::default();
        for entry in entries {
            root.add_entry(&entry.parent_dirs(), entry)?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, parents: &[&str], entry: &IndexEntry) -> anyhow::Result<()> {
        let Some((parent, rest)) = parents.split_first() else {
            self.entries.insert(
                entry.basename().to_string(),
                TreeEntry::Stored(DatabaseEntry::new(entry.oid.clone(), entry.mode())),
            );
            return Ok(());
        };

        let dir_name = parent.rsplit('/').next().unwrap_or(*parent);
        let subtree = self
            .entries
            .entry(format!("{dir_name}/"))
            .or_insert_with(|| TreeEntry::Directory(Tree::default()));

        match subtree {
            TreeEntry::Directory(tree) => tree.add_entry(rest, entry),
            TreeEntry::Stored(_) => Err(anyhow::anyhow!(
                "{} is not a directory in the tree being built",
                parent
            )),
        }
    }

    /// Visit every subtree before its parent; the root is visited last.
    ///
    /// Storing trees in this order guarantees that every subtree a parent
    /// references by oid already exists.
    pub fn traverse<F>(&self, func: &mut F) -> anyhow::Result<()>
    where
        F: FnMut(&Tree) -> anyhow::Result<()>,
    {
        for entry in self.entries.values() {
            if let TreeEntry::Directory(tree) = entry {
                tree.traverse(&mut *func)?;
            }
        }

        func(self)
    }

    /// Entries in serialization order, with directory names unsuffixed
    pub fn entries(&self) -> anyhow::Result<Vec<(String, DatabaseEntry)>> {
        self.entries
            .iter()
            .map(|(name, entry)| {
                Ok((
                    name.trim_end_matches('/').to_string(),
                    DatabaseEntry::new(entry.oid()?, entry.mode()),
                ))
            })
            .collect()
    }

    pub fn subtree(&self, name: &str) -> Option<&Tree> {
        match self.entries.get(&format!("{name}/")) {
            Some(TreeEntry::Directory(tree)) => Some(tree),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Packable for Tree {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut content_bytes = Vec::new();

        for (name, entry) in &self.entries {
            let name = name.trim_end_matches('/');
            write!(content_bytes, "{:o} {}\0", entry.mode().as_u32(), name)?;
            entry.oid()?.write_h40_to(&mut content_bytes)?;
        }

        Ok(Bytes::from(content_bytes))
    }
}

impl Unpackable for Tree {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();

        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            if reader.read_until(b' ', &mut mode_bytes)? == 0 {
                break;
            }
            if mode_bytes.pop() != Some(b' ') {
                anyhow::bail!("unexpected EOF in tree entry mode");
            }
            let mode = EntryMode::from_octal_str(std::str::from_utf8(&mode_bytes)?)?;

            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                anyhow::bail!("unexpected EOF in tree entry name");
            }
            let mut name = String::from_utf8(name_bytes.clone())?;
            if mode.is_tree() {
                name.push('/');
            }

            let oid = ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            entries.insert(name, TreeEntry::Stored(DatabaseEntry::new(oid, mode)));
        }

        Ok(Tree {
            entries,
            oid: OnceCell::new(),
        })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn display(&self) -> String {
        self.entries
            .iter()
            .filter_map(|(name, entry)| {
                let entry = DatabaseEntry::new(entry.oid().ok()?, entry.mode());

                Some(format!(
                    "{} {} {}\t{}",
                    entry.mode.as_str(),
                    entry.object_type(),
                    entry.oid,
                    name.trim_end_matches('/')
                ))
            })
            .collect::<Vec<String>>()
            .join("\n")
    }

    // subtrees are hashed once per build, however often their parents are
    fn object_id(&self) -> anyhow::Result<ObjectId> {
        if let Some(oid) = self.oid.get() {
            return Ok(oid.clone());
        }

        let oid = hash_framed(&self.framed()?);
        Ok(self.oid.get_or_init(|| oid).clone())
    }
}
