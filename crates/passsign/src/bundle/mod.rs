//! Pass bundle handling.
//!
//! This module provides:
//! - [`PassBundle`], the explicit set of files (descriptor plus assets) that
//!   gets signed
//! - [`PassDescriptor`], the parsed identifiers of `pass.json`
//! - [`compute_manifest`], the SHA-1 digest computer producing `manifest.json`
//!
//! # Bundle Layout
//!
//! A signed `.pkpass` archive is flat:
//!
//! | Entry | Description |
//! |-------|-------------|
//! | `pass.json` | Pass descriptor |
//! | assets | Images, localisations, anything else the pass references |
//! | `manifest.json` | SHA-1 digest of every other entry |
//! | `signature` | Detached PKCS#7 signature over `manifest.json` |

pub mod descriptor;
pub mod manifest;

pub use descriptor::PassDescriptor;
pub use manifest::{compute_manifest, Manifest};

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name of the pass descriptor.
pub const PASS_JSON: &str = "pass.json";
/// File name of the digest manifest.
pub const MANIFEST_JSON: &str = "manifest.json";
/// File name of the detached signature.
pub const SIGNATURE: &str = "signature";
/// File name of the assembled archive.
pub const PKPASS_FILE: &str = "pass.pkpass";

/// Names the pipeline writes itself; callers may not supply them.
const GENERATED_NAMES: [&str; 3] = [MANIFEST_JSON, SIGNATURE, PKPASS_FILE];

/// The files of one pass before signing.
///
/// Entries are kept sorted by name. The descriptor is always present under
/// [`PASS_JSON`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassBundle {
    files: BTreeMap<String, Vec<u8>>,
}

impl PassBundle {
    /// Build a bundle from descriptor bytes and named assets.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if an asset name is not a plain file
    /// name, collides with the descriptor or a generated file, or appears
    /// twice.
    pub fn new<I>(descriptor: Vec<u8>, assets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let mut files = BTreeMap::new();
        files.insert(PASS_JSON.to_string(), descriptor);

        for (name, data) in assets {
            validate_asset_name(&name)?;
            if files.insert(name.clone(), data).is_some() {
                return Err(Error::InvalidRequest(format!("Duplicate file: {name}")));
            }
        }

        Ok(Self { files })
    }

    /// Read a flat pass directory.
    ///
    /// Regular files become bundle entries; subdirectories are ignored and
    /// generated files from an earlier signing run are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or a file cannot be read, and
    /// [`Error::InvalidRequest`] if `pass.json` is missing or a file name is
    /// not valid UTF-8.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut descriptor = None;
        let mut assets = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let name = entry.file_name().into_string().map_err(|raw| {
                Error::InvalidRequest(format!("Non UTF-8 file name: {}", raw.to_string_lossy()))
            })?;

            if GENERATED_NAMES.contains(&name.as_str()) {
                tracing::debug!(file = %name, "skipping generated file");
                continue;
            }

            let data = fs::read(entry.path())?;
            if name == PASS_JSON {
                descriptor = Some(data);
            } else {
                assets.push((name, data));
            }
        }

        let descriptor = descriptor.ok_or_else(|| {
            Error::InvalidRequest(format!("Missing {} in {}", PASS_JSON, dir.display()))
        })?;

        Self::new(descriptor, assets)
    }

    /// The raw descriptor bytes.
    pub fn descriptor(&self) -> &[u8] {
        self.files.get(PASS_JSON).map(Vec::as_slice).unwrap_or_default()
    }

    /// Look up a file by name.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Iterate over every file, sorted by name.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(name, data)| (name.as_str(), data.as_slice()))
    }

    /// Number of files, descriptor included.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Always false; a bundle holds at least its descriptor.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all files in bytes.
    pub fn total_size(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Check that an asset name can be stored as a flat archive entry.
fn validate_asset_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidRequest("Empty file name".into()));
    }
    if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidRequest(format!("Invalid file name: {name}")));
    }
    if name == PASS_JSON || GENERATED_NAMES.contains(&name) {
        return Err(Error::InvalidRequest(format!("Reserved file name: {name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn asset(name: &str, data: &[u8]) -> (String, Vec<u8>) {
        (name.to_string(), data.to_vec())
    }

    #[test]
    fn test_new_sorts_and_includes_descriptor() {
        let bundle = PassBundle::new(
            b"{}".to_vec(),
            vec![asset("thumbnail.png", b"qr"), asset("icon.png", b"icon")],
        )
        .unwrap();

        let names: Vec<&str> = bundle.files().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["icon.png", "pass.json", "thumbnail.png"]);
        assert_eq!(bundle.descriptor(), b"{}");
        assert_eq!(bundle.get("icon.png"), Some(&b"icon"[..]));
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.total_size(), 8);
    }

    #[test]
    fn test_rejects_path_separators() {
        for name in ["en.lproj/pass.strings", "..\\secret", "..", "."] {
            let result = PassBundle::new(b"{}".to_vec(), vec![asset(name, b"x")]);
            assert!(
                matches!(result, Err(Error::InvalidRequest(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_reserved_names() {
        for name in [PASS_JSON, MANIFEST_JSON, SIGNATURE, PKPASS_FILE, ""] {
            let result = PassBundle::new(b"{}".to_vec(), vec![asset(name, b"x")]);
            assert!(matches!(result, Err(Error::InvalidRequest(_))), "{name:?}");
        }
    }

    #[test]
    fn test_rejects_duplicates() {
        let result = PassBundle::new(
            b"{}".to_vec(),
            vec![asset("icon.png", b"a"), asset("icon.png", b"b")],
        );
        match result {
            Err(Error::InvalidRequest(msg)) => assert!(msg.contains("Duplicate")),
            other => panic!("expected duplicate error, got {other:?}"),
        }
    }

    #[test]
    fn test_from_dir() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(PASS_JSON), b"{}").unwrap();
        fs::write(temp_dir.path().join("icon.png"), b"icon").unwrap();
        fs::write(temp_dir.path().join(MANIFEST_JSON), b"stale").unwrap();
        fs::write(temp_dir.path().join(SIGNATURE), b"stale").unwrap();
        fs::create_dir(temp_dir.path().join("en.lproj")).unwrap();

        let bundle = PassBundle::from_dir(temp_dir.path()).unwrap();
        let names: Vec<&str> = bundle.files().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["icon.png", "pass.json"]);
    }

    #[test]
    fn test_from_dir_requires_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("icon.png"), b"icon").unwrap();

        let result = PassBundle::from_dir(temp_dir.path());
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_from_dir_not_found() {
        let result = PassBundle::from_dir("/nonexistent/pass-dir");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
