//! Credential store handle and exported credential material.

use secrecy::SecretString;
use std::path::{Path, PathBuf};

/// File name of the exported signer certificate.
pub const CERT_FILE: &str = "pass_cert.pem";
/// File name of the exported, passphrase-encrypted private key.
pub const KEY_FILE: &str = "pass_key.pem";

/// A PKCS#12 store holding one certificate and its private key.
///
/// The passphrase is held as a [`SecretString`] and never printed by
/// `Debug`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    passphrase: SecretString,
}

impl CredentialStore {
    /// Refer to the store at `path`, protected by `passphrase`.
    pub fn new(path: impl AsRef<Path>, passphrase: SecretString) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            passphrase,
        }
    }

    /// Location of the `.p12` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Passphrase protecting the store.
    pub fn passphrase(&self) -> &SecretString {
        &self.passphrase
    }
}

/// Certificate and key exported into a working area.
///
/// The key file is PEM, encrypted under [`ExportedCredentials::passphrase`],
/// which is the store passphrase.
#[derive(Debug, Clone)]
pub struct ExportedCredentials {
    /// PEM certificate path.
    pub certificate: PathBuf,
    /// Encrypted PEM private key path.
    pub private_key: PathBuf,
    /// Passphrase for the private key file.
    pub passphrase: SecretString,
}
