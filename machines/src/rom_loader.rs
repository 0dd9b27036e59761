//! ROM loading and validation.
//!
//! A machine declares the firmware it needs as [`RomRegion`]s: named files,
//! their sizes, where they land, and their expected MD5 digest. Files come
//! from a [`RomSet`] built from a directory of extracted ROMs or from
//! in-memory slices (for testing). Any missing, mis-sized, or mismatched
//! file is a [`LoadError`] and the machine does not start.

use std::collections::HashMap;
use std::path::Path;

use log::debug;
use md5::{Digest, Md5};
use thiserror::Error;

/// Lowercase hex MD5 of `data`.
pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why a firmware region could not be assembled. Always fatal to startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing ROM file: {0}")]
    MissingFile(String),

    #[error("ROM {file}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        file: String,
        expected: usize,
        actual: usize,
    },

    /// Digests are lowercase hex.
    #[error("ROM {file}: MD5 expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

// ---------------------------------------------------------------------------
// RomSet
// ---------------------------------------------------------------------------

/// Chip files by name, wherever they came from.
pub struct RomSet {
    files: HashMap<String, Vec<u8>>,
}

impl RomSet {
    /// Every regular file directly inside `path`, keyed by file name.
    pub fn from_directory(path: &Path) -> Result<Self, LoadError> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            let Some(name) = file_path.file_name() else {
                continue;
            };
            let name = name.to_string_lossy().into_owned();
            entries.push((name, std::fs::read(&file_path)?));
        }
        Ok(Self::from_entries(entries))
    }

    /// Create a RomSet from owned (filename, data) pairs, e.g. the members
    /// of an archive.
    pub fn from_entries(entries: Vec<(String, Vec<u8>)>) -> Self {
        let files: HashMap<_, _> = entries.into_iter().collect();
        debug!("ROM set with {} files", files.len());
        Self { files }
    }

    /// Create a RomSet from programmatic byte slices (for testing).
    pub fn from_slices(entries: &[(&str, &[u8])]) -> Self {
        Self::from_entries(
            entries
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|v| v.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[u8], LoadError> {
        self.get(name)
            .ok_or_else(|| LoadError::MissingFile(name.to_string()))
    }

    pub fn require_sized(&self, name: &str, expected_size: usize) -> Result<&[u8], LoadError> {
        let data = self.require(name)?;
        if data.len() != expected_size {
            return Err(LoadError::SizeMismatch {
                file: name.to_string(),
                expected: expected_size,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    pub fn file_names(&self) -> Vec<&str> {
        self.files.keys().map(|s| s.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// RomEntry / RomRegion
// ---------------------------------------------------------------------------

/// One chip file and where it lands in its region.
pub struct RomEntry {
    pub name: &'static str,
    pub size: usize,
    pub offset: usize,
    /// Expected MD5 as lowercase hex. `None` accepts any content.
    pub md5: Option<&'static str>,
}

/// The chips that make up one firmware image.
///
/// Call [`load`](Self::load) to assemble the region from a [`RomSet`],
/// or [`load_skip_checksums`](Self::load_skip_checksums) to accept
/// modified dumps (sizes are still checked).
pub struct RomRegion {
    pub size: usize,
    pub entries: &'static [RomEntry],
}

impl RomRegion {
    pub fn load(&self, rom_set: &RomSet) -> Result<Vec<u8>, LoadError> {
        self.load_inner(rom_set, true)
    }

    pub fn load_skip_checksums(&self, rom_set: &RomSet) -> Result<Vec<u8>, LoadError> {
        self.load_inner(rom_set, false)
    }

    fn load_inner(&self, rom_set: &RomSet, verify_checksums: bool) -> Result<Vec<u8>, LoadError> {
        let mut region = vec![0u8; self.size];

        for entry in self.entries {
            debug_assert!(
                entry.offset + entry.size <= self.size,
                "RomEntry '{}' exceeds region bounds",
                entry.name,
            );

            let data = rom_set.require_sized(entry.name, entry.size)?;

            if verify_checksums && let Some(expected) = entry.md5 {
                let actual = md5_hex(data);
                if actual != expected {
                    return Err(LoadError::ChecksumMismatch {
                        file: entry.name.to_string(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }

            region[entry.offset..entry.offset + entry.size].copy_from_slice(data);
        }

        Ok(region)
    }

    /// (file name, actual MD5) for every entry present in `rom_set`.
    pub fn digests(&self, rom_set: &RomSet) -> Vec<(&'static str, Option<String>)> {
        self.entries
            .iter()
            .map(|entry| (entry.name, rom_set.get(entry.name).map(md5_hex)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
