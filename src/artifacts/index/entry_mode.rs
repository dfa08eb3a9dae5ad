//! Object modes stored in trees and index entries

use crate::artifacts::index::IndexError;

#[derive(Debug, Clone, Copy, Eq, Ord, Default, PartialEq, PartialOrd, Hash)]
pub enum FileMode {
    #[default]
    Regular,
    Executable,
}

#[derive(Debug, Clone, Copy, Eq, Ord, PartialEq, PartialOrd, Hash)]
pub enum EntryMode {
    File(FileMode),
    Directory,
}

impl Default for EntryMode {
    fn default() -> Self {
        EntryMode::File(FileMode::Regular)
    }
}

impl EntryMode {
    /// Octal ASCII form used in tree objects (no leading zero for directories)
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File(FileMode::Regular) => "100644",
            EntryMode::File(FileMode::Executable) => "100755",
            EntryMode::Directory => "40000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            EntryMode::File(FileMode::Regular) => 0o100644,
            EntryMode::File(FileMode::Executable) => 0o100755,
            EntryMode::Directory => 0o40000,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }

    pub fn from_octal_str(mode: &str) -> anyhow::Result<Self> {
        let mode = u32::from_str_radix(mode, 8)
            .map_err(|_| anyhow::anyhow!("Invalid entry mode: {mode}"))?;

        Ok(Self::try_from(mode)?)
    }
}

impl From<bool> for FileMode {
    fn from(executable: bool) -> Self {
        match executable {
            true => FileMode::Executable,
            false => FileMode::Regular,
        }
    }
}

impl From<FileMode> for EntryMode {
    fn from(mode: FileMode) -> Self {
        EntryMode::File(mode)
    }
}

impl TryFrom<u32> for EntryMode {
    type Error = IndexError;

    fn try_from(mode: u32) -> Result<Self, Self::Error> {
        match mode {
            0o100644 => Ok(EntryMode::File(FileMode::Regular)),
            0o100755 => Ok(EntryMode::File(FileMode::Executable)),
            0o40000 => Ok(EntryMode::Directory),
            _ => Err(IndexError::InvalidFormat(format!(
                "unknown entry mode {mode:o}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("100644", EntryMode::File(FileMode::Regular))]
    #[case("100755", EntryMode::File(FileMode::Executable))]
    #[case("40000", EntryMode::Directory)]
    fn octal_strings_round_trip(#[case] octal: &str, #[case] mode: EntryMode) {
        assert_eq!(EntryMode::from_octal_str(octal).unwrap(), mode);
        assert_eq!(mode.as_str(), octal);
        assert_eq!(format!("{:o}", mode.as_u32()), octal);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(EntryMode::try_from(0o120000).is_err());
        assert!(EntryMode::from_octal_str("9").is_err());
    }
}
