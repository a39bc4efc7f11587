//! In-process OpenSSL backend.

use super::backend::{DetachedSignRequest, SigningBackend};
use super::credentials::{CredentialStore, ExportedCredentials, CERT_FILE, KEY_FILE};
use crate::workspace::WorkingArea;
use crate::{Error, Result};
use openssl::asn1::Asn1Time;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkcs7::{Pkcs7, Pkcs7Flags};
use openssl::pkey::{PKey, PKeyRef, Private};
use openssl::stack::Stack;
use openssl::symm::Cipher;
use openssl::x509::{X509Ref, X509};
use secrecy::{ExposeSecret, SecretVec};
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

/// PKCS#7 flags for the manifest signature: sign the bytes as-is and leave
/// the content out of the structure.
pub const SIGNING_FLAGS: Pkcs7Flags = Pkcs7Flags::BINARY.union(Pkcs7Flags::DETACHED);

/// Signs with the OpenSSL library linked into the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpensslBackend;

impl OpensslBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl SigningBackend for OpensslBackend {
    fn name(&self) -> &'static str {
        "openssl"
    }

    fn extract_credentials(
        &self,
        store: &CredentialStore,
        area: &WorkingArea,
    ) -> Result<ExportedCredentials> {
        let (certificate, private_key) = load_pkcs12(store)?;

        if let Some(team_id) = extract_team_id(&certificate) {
            tracing::debug!(team_id = %team_id, "loaded signing certificate");
        }
        warn_if_expired(&certificate);

        let cert_pem = certificate
            .to_pem()
            .map_err(|e| Error::Credential(format!("Failed to export certificate: {e}")))?;

        let passphrase = store.passphrase().clone();
        let key_pem = SecretVec::new(
            private_key
                .private_key_to_pem_pkcs8_passphrase(
                    Cipher::aes_256_cbc(),
                    passphrase.expose_secret().as_bytes(),
                )
                .map_err(|e| Error::Credential(format!("Failed to export private key: {e}")))?,
        );

        let certificate = area.write_secret(CERT_FILE, &cert_pem)?;
        let private_key = area.write_secret(KEY_FILE, key_pem.expose_secret())?;

        Ok(ExportedCredentials {
            certificate,
            private_key,
            passphrase,
        })
    }

    fn sign_detached(&self, request: &DetachedSignRequest<'_>) -> Result<Vec<u8>> {
        let credentials = request.credentials;

        let certificate = X509::from_pem(&fs::read(&credentials.certificate)?)
            .map_err(|e| Error::Signing(format!("Failed to load certificate: {e}")))?;

        let key_pem = SecretVec::new(fs::read(&credentials.private_key)?);
        let private_key = PKey::private_key_from_pem_passphrase(
            key_pem.expose_secret(),
            credentials.passphrase.expose_secret().as_bytes(),
        )
        .map_err(|e| Error::Signing(format!("Failed to load private key: {e}")))?;

        let mut chain = Stack::new()
            .map_err(|e| Error::Signing(format!("Failed to allocate certificate stack: {e}")))?;
        for cert in load_trust_chain(request.trust_chain)? {
            chain
                .push(cert)
                .map_err(|e| Error::Signing(format!("Failed to add trust chain: {e}")))?;
        }

        let pkcs7 = Pkcs7::sign(&certificate, &private_key, &chain, request.manifest, SIGNING_FLAGS)
            .map_err(|e| Error::Signing(format!("Failed to build PKCS#7 signature: {e}")))?;

        pkcs7
            .to_der()
            .map_err(|e| Error::Signing(format!("Failed to encode signature: {e}")))
    }
}

/// Open a PKCS#12 store and return its certificate and matching key.
fn load_pkcs12(store: &CredentialStore) -> Result<(X509, PKey<Private>)> {
    let p12_data = fs::read(store.path()).map_err(|e| {
        Error::Credential(format!(
            "Cannot read credential store {}: {}",
            store.path().display(),
            e
        ))
    })?;

    let pkcs12 = Pkcs12::from_der(&p12_data)
        .map_err(|e| Error::Credential(format!("Invalid PKCS#12: {e}")))?;

    let parsed = pkcs12
        .parse2(store.passphrase().expose_secret())
        .map_err(|e| Error::Credential(format!("Failed to parse PKCS#12: {e}")))?;

    let certificate = parsed
        .cert
        .ok_or_else(|| Error::Credential("No certificate in PKCS#12".into()))?;

    let private_key = parsed
        .pkey
        .ok_or_else(|| Error::Credential("No private key in PKCS#12".into()))?;

    validate_key_pair(&certificate, &private_key)?;

    Ok((certificate, private_key))
}

/// Validate that the private key matches the certificate's public key
fn validate_key_pair(cert: &X509Ref, private_key: &PKeyRef<Private>) -> Result<()> {
    let cert_public_key = cert.public_key().map_err(|e| {
        Error::Credential(format!("Failed to extract public key from certificate: {e}"))
    })?;

    if !private_key.public_eq(&cert_public_key) {
        return Err(Error::Credential(
            "Private key does not match certificate public key".into(),
        ));
    }

    Ok(())
}

/// Extract team ID from certificate subject
fn extract_team_id(cert: &X509Ref) -> Option<String> {
    cert.subject_name()
        .entries_by_nid(Nid::ORGANIZATIONALUNITNAME)
        .find_map(|entry| entry.data().as_utf8().ok().map(|s| s.to_string()))
}

fn warn_if_expired(cert: &X509Ref) {
    let Ok(now) = Asn1Time::days_from_now(0) else {
        return;
    };
    if let Ok(Ordering::Less) = cert.not_after().compare(&now) {
        tracing::warn!(
            not_after = %cert.not_after(),
            "signing certificate has expired; signing anyway"
        );
    }
}

/// Load the intermediate certificate(s), PEM (one or more) or DER.
fn load_trust_chain(path: &Path) -> Result<Vec<X509>> {
    let data = fs::read(path).map_err(|e| {
        Error::Signing(format!(
            "Cannot read trust chain certificate {}: {}",
            path.display(),
            e
        ))
    })?;

    let certs = if data.windows(10).any(|w| w == b"-----BEGIN") {
        X509::stack_from_pem(&data)
    } else {
        X509::from_der(&data).map(|cert| vec![cert])
    }
    .map_err(|e| Error::Signing(format!("Invalid trust chain certificate: {e}")))?;

    if certs.is_empty() {
        return Err(Error::Signing("Trust chain file holds no certificate".into()));
    }
    Ok(certs)
}
