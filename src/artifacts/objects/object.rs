use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{BufRead, Write};

/// Canonical byte encoding of a value
pub trait Packable {
    fn serialize(&self) -> Result<Bytes>;
}

pub trait Unpackable {
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// A content-addressed object: its identity is derived from its bytes.
pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn display(&self) -> String;

    /// `"{type} {len}\0{payload}"`, the bytes that are hashed and stored
    fn framed(&self) -> Result<Bytes> {
        let content = self.serialize()?;

        let mut object_bytes = Vec::with_capacity(content.len() + 32);
        write!(object_bytes, "{} {}\0", self.object_type(), content.len())?;
        object_bytes.extend_from_slice(&content);

        Ok(Bytes::from(object_bytes))
    }

    fn object_id(&self) -> Result<ObjectId> {
        Ok(hash_framed(&self.framed()?))
    }
}

pub(crate) fn hash_framed(framed: &[u8]) -> ObjectId {
    let digest = Sha1::digest(framed);
    ObjectId::from_raw(&digest)
}

/// A decoded object of any kind
#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(blob) => blob.object_type(),
            ObjectBox::Tree(tree) => tree.object_type(),
            ObjectBox::Commit(commit) => commit.object_type(),
        }
    }

    pub fn display(&self) -> String {
        match self {
            ObjectBox::Blob(blob) => blob.display(),
            ObjectBox::Tree(tree) => tree.display(),
            ObjectBox::Commit(commit) => commit.display(),
        }
    }
}
