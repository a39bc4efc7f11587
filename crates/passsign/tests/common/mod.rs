//! Shared fixtures for integration tests.

#![allow(dead_code)]

#[path = "../../src/testing.rs"]
mod testing;

use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::X509;
use passsign::SignerConfig;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use tempfile::TempDir;
use zip::ZipArchive;

pub use testing::{Credentials, PASSPHRASE, PASS_TYPE, TEAM_ID};

pub struct TestEnv {
    pub creds: Credentials,
    pub work_dir: TempDir,
}

impl TestEnv {
    pub fn config(&self) -> SignerConfig {
        SignerConfig::new()
            .credential_store(&self.creds.p12_path)
            .passphrase(PASSPHRASE)
            .trust_chain(&self.creds.wwdr_path)
            .pass_type_identifier(PASS_TYPE)
            .team_identifier(TEAM_ID)
            .organization_name("Example Corp")
            .work_dir(self.work_dir.path())
    }

    /// Number of entries left behind in the working-area root.
    pub fn leftover_areas(&self) -> usize {
        fs::read_dir(self.work_dir.path()).unwrap().count()
    }
}

pub fn test_env() -> TestEnv {
    TestEnv {
        creds: testing::credentials(),
        work_dir: TempDir::new().unwrap(),
    }
}

pub fn descriptor(serial: &str) -> Vec<u8> {
    format!(
        r#"{{
  "formatVersion": 1,
  "passTypeIdentifier": "{PASS_TYPE}",
  "teamIdentifier": "{TEAM_ID}",
  "serialNumber": "{serial}",
  "organizationName": "Example Corp",
  "description": "Business card"
}}"#
    )
    .into_bytes()
}

/// Every entry of an archive, by name.
pub fn unzip(bytes: &[u8]) -> BTreeMap<String, Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        entries.insert(entry.name().to_string(), data);
    }
    entries
}

/// Verify a detached DER signature over `content` without chain checks.
pub fn verify_signature(signature: &[u8], content: &[u8]) -> bool {
    let Ok(pkcs7) = Pkcs7::from_der(signature) else {
        return false;
    };
    let certs: Stack<X509> = Stack::new().unwrap();
    let store = X509StoreBuilder::new().unwrap().build();
    pkcs7
        .verify(
            &certs,
            &store,
            Some(content),
            None,
            Pkcs7Flags::NOVERIFY | Pkcs7Flags::BINARY,
        )
        .is_ok()
}
