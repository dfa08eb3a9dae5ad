//! Content-addressed object database
//!
//! Objects live at `objects/<oid[0..2]>/<oid[2..]>` as zlib-compressed
//! `"{type} {len}\0{payload}"`. An object file is written once, to a randomly
//! named temp file in the destination directory, and only becomes visible
//! when the temp file is renamed into place.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::{Object, ObjectBox, Unpackable, hash_framed};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Context;
use bytes::Bytes;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::cell::RefCell;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Prefix of the temp files objects are staged in before the rename
const TEMP_PREFIX: &str = "tmp_obj_";

/// Length of the random part of a temp file name
const TEMP_NAME_LENGTH: usize = 6;

/// Fresh names tried before giving up on creating a temp file
const TEMP_NAME_ATTEMPTS: usize = 16;

pub struct Database {
    path: Box<Path>,
    rng: RefCell<Box<dyn RngCore>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Self::with_rng(path, Box::new(StdRng::from_os_rng()))
    }

    /// Use `rng` for temp file names, e.g. a seeded generator in tests.
    pub fn with_rng(path: Box<Path>, rng: Box<dyn RngCore>) -> Self {
        Database {
            path,
            rng: RefCell::new(rng),
        }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    pub fn object_path(&self, object_id: &ObjectId) -> PathBuf {
        self.path.join(object_id.to_path())
    }

    pub fn exists(&self, object_id: &ObjectId) -> bool {
        self.object_path(object_id).exists()
    }

    /// Persist `object` unless an object with the same id already exists.
    pub fn store(&self, object: &impl Object) -> anyhow::Result<ObjectId> {
        let framed = object.framed()?;
        let object_id = hash_framed(&framed);
        let object_path = self.object_path(&object_id);

        // equal ids mean equal content, so an existing file is already correct
        if object_path.exists() {
            tracing::debug!(oid = %object_id, "object already stored");
            return Ok(object_id);
        }

        self.write_object(&object_path, &framed)?;
        tracing::debug!(
            oid = %object_id,
            object_type = %object.object_type(),
            size = framed.len(),
            "stored object"
        );

        Ok(object_id)
    }

    /// Decompressed `"{type} {len}\0{payload}"` bytes of a stored object
    pub fn load(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        let object_path = self.object_path(object_id);
        let compressed = std::fs::read(&object_path)
            .with_context(|| format!("Unable to read object file {}", object_path.display()))?;

        Self::decompress(&compressed)
    }

    pub fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        let mut object_reader = Cursor::new(self.load(object_id)?);
        let (object_type, size) = ObjectType::parse_header(&mut object_reader)?;

        let payload_len = object_reader.get_ref().len() - object_reader.position() as usize;
        if payload_len != size {
            anyhow::bail!("Object {object_id} declares {size} bytes but holds {payload_len}");
        }

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(object_reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(object_reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(object_reader)?)),
        })
    }

    pub fn parse_object_as_commit(&self, object_id: &ObjectId) -> anyhow::Result<Option<Commit>> {
        match self.parse_object(object_id)? {
            ObjectBox::Commit(commit) => Ok(Some(*commit)),
            _ => Ok(None),
        }
    }

    fn write_object(&self, object_path: &Path, framed: &[u8]) -> anyhow::Result<()> {
        let object_dir = object_path
            .parent()
            .with_context(|| format!("Invalid object path {}", object_path.display()))?;

        let compressed = Self::compress(framed)?;
        let (temp_path, mut file) = self.create_temp_file(object_dir)?;

        let written = file
            .write_all(&compressed)
            .and_then(|_| file.sync_all())
            .with_context(|| format!("Unable to write object file {}", temp_path.display()));
        drop(file);

        // rename last: readers see either no object or the whole object
        let renamed = written.and_then(|_| {
            std::fs::rename(&temp_path, object_path).with_context(|| {
                format!("Unable to rename object file to {}", object_path.display())
            })
        });
        if renamed.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }

        renamed
    }

    /// Exclusively create a fresh temp file next to the final object path.
    ///
    /// A missing directory is created and the open retried once; a name
    /// collision is retried with a new random name.
    fn create_temp_file(&self, object_dir: &Path) -> anyhow::Result<(PathBuf, File)> {
        let mut created_dir = false;
        let mut attempts = 0;

        loop {
            let temp_path = object_dir.join(self.generate_temp_name());
            let opened = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(&temp_path);

            match opened {
                Ok(file) => return Ok((temp_path, file)),
                Err(error) if error.kind() == ErrorKind::NotFound && !created_dir => {
                    created_dir = true;
                    std::fs::create_dir_all(object_dir).with_context(|| {
                        format!("Unable to create object directory {}", object_dir.display())
                    })?;
                }
                Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                    attempts += 1;
                    tracing::debug!(temp_path = %temp_path.display(), "temp object name taken");
                    if attempts >= TEMP_NAME_ATTEMPTS {
                        return Err(error).with_context(|| {
                            format!("Unable to find a free temp name in {}", object_dir.display())
                        });
                    }
                }
                Err(error) => {
                    return Err(error).with_context(|| {
                        format!("Unable to open object file {}", temp_path.display())
                    });
                }
            }
        }
    }

    fn generate_temp_name(&self) -> String {
        let mut rng = self.rng.borrow_mut();
        let suffix = (0..TEMP_NAME_LENGTH)
            .map(|_| char::from(rng.sample(Alphanumeric)))
            .collect::<String>();

        format!("{TEMP_PREFIX}{suffix}")
    }

    fn compress(data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
        encoder
            .write_all(data)
            .context("Unable to compress object content")?;

        encoder
            .finish()
            .context("Unable to finish compressing object content")
    }

    fn decompress(data: &[u8]) -> anyhow::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(data);
        let mut decompressed_content = Vec::new();
        decoder
            .read_to_end(&mut decompressed_content)
            .context("Unable to decompress object content")?;

        Ok(decompressed_content.into())
    }
}
