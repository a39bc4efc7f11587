//! `.pkpass` archive creation.
//!
//! Packs the bundle files, `manifest.json`, and `signature` into a flat ZIP
//! archive held in memory.
//!
//! # Features
//!
//! - Configurable compression via [`CompressionLevel`]
//! - Entries sorted by name with fixed timestamps and permissions, so the
//!   same inputs always produce the same bytes
//! - The archive's own file name is never packed into itself
//!
//! # Examples
//!
//! ```
//! use passsign::archive::{build_pkpass, CompressionLevel};
//!
//! let entries: [(&str, &[u8]); 2] = [("pass.json", b"{}"), ("icon.png", b"icon")];
//! let bytes = build_pkpass(entries, CompressionLevel::DEFAULT)?;
//! assert!(bytes.starts_with(b"PK"));
//! # Ok::<(), passsign::Error>(())
//! ```

use crate::bundle::PKPASS_FILE;
use crate::Result;
use std::collections::BTreeMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Permissions recorded for every entry.
const ENTRY_MODE: u32 = 0o644;

/// ZIP compression level for archive creation.
///
/// Controls the trade-off between compression speed and output file size.
///
/// # Examples
///
/// ```
/// use passsign::archive::CompressionLevel;
///
/// let fast = CompressionLevel::NONE;
/// let balanced = CompressionLevel::DEFAULT;
/// let small = CompressionLevel::MAX;
///
/// // Values above 9 are clamped
/// assert_eq!(CompressionLevel::new(12).level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression (level 0); entries are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default deflate compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum deflate compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(self) -> SimpleFileOptions {
        let options = SimpleFileOptions::default()
            .last_modified_time(DateTime::default())
            .unix_permissions(ENTRY_MODE);

        if self.0 == 0 {
            options.compression_method(CompressionMethod::Stored)
        } else {
            options
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.0)))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Builds a `.pkpass` archive from named entries.
///
/// Every entry is written at the archive root under its own name, in sorted
/// order. An entry named `pass.pkpass` is skipped. If a name occurs twice,
/// the last one wins.
///
/// # Errors
///
/// Returns [`crate::Error::Zip`] if the archive cannot be written.
pub fn build_pkpass<'a, I>(entries: I, compression_level: CompressionLevel) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let entries: BTreeMap<&str, &[u8]> = entries
        .into_iter()
        .filter(|(name, _)| *name != PKPASS_FILE)
        .collect();

    let options = compression_level.file_options();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (name, data) in entries {
        zip.start_file(name, options)?;
        zip.write_all(data)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entries() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("signature", b"\x30\x82\x01\x00"),
            ("pass.json", b"{\"formatVersion\":1}"),
            ("manifest.json", b"{}"),
            ("icon.png", b"icon"),
        ]
    }

    fn read_archive(bytes: &[u8]) -> Vec<(String, Vec<u8>, CompressionMethod)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut entry = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                (entry.name().to_string(), data, entry.compression())
            })
            .collect()
    }

    #[test]
    fn test_build_pkpass_flat_sorted() {
        let bytes = build_pkpass(entries(), CompressionLevel::DEFAULT).unwrap();
        let contents = read_archive(&bytes);

        let names: Vec<&str> = contents.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(names, vec!["icon.png", "manifest.json", "pass.json", "signature"]);

        for (name, data, method) in &contents {
            assert!(!name.contains('/'), "{name} must be flat");
            assert_eq!(*method, CompressionMethod::Deflated);
            let original = entries().into_iter().find(|(n, _)| *n == name.as_str()).unwrap().1;
            assert_eq!(data.as_slice(), original);
        }
    }

    #[test]
    fn test_build_pkpass_skips_itself() {
        let mut with_self = entries();
        with_self.push((PKPASS_FILE, b"PK\x03\x04previous"));

        let bytes = build_pkpass(with_self, CompressionLevel::DEFAULT).unwrap();
        let contents = read_archive(&bytes);

        assert_eq!(contents.len(), 4);
        assert!(contents.iter().all(|(name, _, _)| name != PKPASS_FILE));
    }

    #[test]
    fn test_build_pkpass_deterministic() {
        let first = build_pkpass(entries(), CompressionLevel::DEFAULT).unwrap();
        let mut reversed = entries();
        reversed.reverse();
        let second = build_pkpass(reversed, CompressionLevel::DEFAULT).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_build_pkpass_no_compression() {
        let bytes = build_pkpass(entries(), CompressionLevel::NONE).unwrap();
        let contents = read_archive(&bytes);
        assert!(contents
            .iter()
            .all(|(_, _, method)| *method == CompressionMethod::Stored));
    }

    #[test]
    fn test_build_pkpass_empty() {
        let bytes = build_pkpass(std::iter::empty(), CompressionLevel::DEFAULT).unwrap();
        assert!(read_archive(&bytes).is_empty());
    }

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::NONE.level(), 0);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::MAX.level(), 9);
        assert_eq!(CompressionLevel::new(15).level(), 9);
        assert_eq!(CompressionLevel::from(5).level(), 5);
        assert_eq!(CompressionLevel::default(), CompressionLevel::DEFAULT);
    }
}
