//! Hashing I/O wrapper for the index file
//!
//! Every byte read or written through a `Checksum` is folded into a running
//! SHA-1 digest. Writers append the digest with `write_checksum`; readers
//! compare it against the trailing bytes with `verify`.

use crate::artifacts::index::{CHECKSUM_SIZE, IndexError};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::io::{ErrorKind, Read, Write};

#[derive(Debug)]
pub struct Checksum<T> {
    inner: T,
    digest: Sha1,
}

impl<T> Checksum<T> {
    pub fn new(inner: T) -> Self {
        Checksum {
            inner,
            digest: Sha1::new(),
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Checksum<T> {
    /// Read exactly `size` bytes, or fail with `UnexpectedEof`.
    pub fn read(&mut self, size: usize) -> Result<Bytes, IndexError> {
        let mut buffer = vec![0; size];
        self.read_exact_or_eof(&mut buffer)?;

        self.digest.update(&buffer);
        Ok(Bytes::from(buffer))
    }

    pub fn verify(&mut self) -> Result<(), IndexError> {
        let mut expected_checksum = [0u8; CHECKSUM_SIZE];
        self.read_exact_or_eof(&mut expected_checksum)?;

        let actual_checksum = self.digest.clone().finalize();

        if expected_checksum != actual_checksum.as_slice() {
            return Err(IndexError::InvalidFormat(
                "Checksum does not match value stored on disk".to_string(),
            ));
        }

        Ok(())
    }

    fn read_exact_or_eof(&mut self, buffer: &mut [u8]) -> Result<(), IndexError> {
        self.inner.read_exact(buffer).map_err(|error| match error.kind() {
            ErrorKind::UnexpectedEof => IndexError::UnexpectedEof,
            _ => IndexError::Io(error),
        })
    }
}

impl<T: Write> Checksum<T> {
    pub fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.inner.write_all(data)?;
        self.digest.update(data);

        Ok(())
    }

    pub fn write_checksum(&mut self) -> std::io::Result<()> {
        let checksum = self.digest.clone().finalize();
        self.inner.write_all(checksum.as_slice())
    }
}
