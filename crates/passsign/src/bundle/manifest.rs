//! `manifest.json` generation.
//!
//! The manifest maps every bundle file to the lowercase hex SHA-1 digest of
//! its exact bytes. It is the payload of the detached signature, so its
//! serialized form must be byte-stable: keys are sorted and the layout is
//! fixed.

use super::{MANIFEST_JSON, SIGNATURE};
use crate::Result;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// File name to SHA-1 hex digest, sorted by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Digest recorded for a file.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterate over `(file name, digest)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of files covered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no file is covered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize as pretty JSON with two-space indentation and sorted keys.
    ///
    /// These are the exact bytes that get signed and stored as
    /// `manifest.json`.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.entries)?)
    }

    /// Parse a serialized manifest.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Hex-encoded SHA-1 of `data`.
pub fn sha1_hex(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Compute the manifest for a set of named files.
///
/// Entries named `manifest.json` or `signature` are skipped even if present;
/// every other entry is hashed.
pub fn compute_manifest<'a, I>(files: I) -> Manifest
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let entries = files
        .into_iter()
        .filter(|(name, _)| *name != MANIFEST_JSON && *name != SIGNATURE)
        .map(|(name, data)| (name.to_string(), sha1_hex(data)))
        .collect();

    Manifest { entries }
}
