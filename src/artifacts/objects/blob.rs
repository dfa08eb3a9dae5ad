//! Git blob object
//!
//! Blobs store file content verbatim, without filename or permissions (those
//! live in trees and index entries).

use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Blob {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }
}

impl Packable for Blob {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        Ok(self.content.clone())
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        Ok(Self::new(content))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn display(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hello_blob_has_the_git_object_id() {
        let blob = Blob::new("hello");

        assert_eq!(&blob.framed().unwrap()[..], b"blob 5\0hello");
        assert_eq!(
            blob.object_id().unwrap().as_ref(),
            "b6fc4c620b67d95f953a5c1c1230aaab5db5a1b0"
        );
    }

    #[test]
    fn binary_content_is_kept_verbatim() {
        let blob = Blob::new(vec![0u8, 159, 146, 150]);

        assert_eq!(&blob.serialize().unwrap()[..], &[0u8, 159, 146, 150]);
        assert_eq!(&blob.framed().unwrap()[..7], b"blob 4\0");
    }

    #[test]
    fn empty_blob_has_the_git_object_id() {
        assert_eq!(
            Blob::new(Bytes::new()).object_id().unwrap().as_ref(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }
}
