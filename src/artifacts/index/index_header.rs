use crate::artifacts::index::{IndexError, SIGNATURE, VERSION};
use crate::artifacts::objects::object::{Packable, Unpackable};
use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use derive_new::new;
use std::io::{BufRead, Write};

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct IndexHeader {
    pub marker: [u8; 4],
    pub version: u32,
    pub entries_count: u32,
}

impl IndexHeader {
    pub fn with_count(entries_count: u32) -> Self {
        IndexHeader {
            marker: signature(),
            version: VERSION,
            entries_count,
        }
    }

    /// Reject anything that is not a version 2 `DIRC` file.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.marker != signature() {
            return Err(IndexError::InvalidFormat(format!(
                "Signature: expected '{}' but found '{}'",
                SIGNATURE,
                String::from_utf8_lossy(&self.marker)
            )));
        }

        if self.version != VERSION {
            return Err(IndexError::InvalidFormat(format!(
                "Version: expected '{}' but found '{}'",
                VERSION, self.version
            )));
        }

        Ok(())
    }
}

fn signature() -> [u8; 4] {
    let mut marker = [0u8; 4];
    marker.copy_from_slice(SIGNATURE.as_bytes());
    marker
}

impl Packable for IndexHeader {
    fn serialize(&self) -> anyhow::Result<Bytes> {
        let mut bytes = Vec::new();
        bytes.write_all(&self.marker)?;
        bytes.write_u32::<NetworkEndian>(self.version)?;
        bytes.write_u32::<NetworkEndian>(self.entries_count)?;

        Ok(Bytes::from(bytes))
    }
}

impl Unpackable for IndexHeader {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        let mut marker = [0u8; 4];
        reader.read_exact(&mut marker)?;
        let version = reader.read_u32::<NetworkEndian>()?;
        let entries_count = reader.read_u32::<NetworkEndian>()?;

        Ok(IndexHeader {
            marker,
            version,
            entries_count,
        })
    }
}
