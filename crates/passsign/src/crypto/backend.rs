//! The narrow interface between the pipeline and a crypto implementation.

use super::credentials::{CredentialStore, ExportedCredentials};
use crate::workspace::WorkingArea;
use crate::Result;
use std::path::Path;

/// Inputs for one detached signature.
#[derive(Debug, Clone, Copy)]
pub struct DetachedSignRequest<'a> {
    /// Exported signer certificate and key.
    pub credentials: &'a ExportedCredentials,
    /// Intermediate certificate(s) to embed, PEM or DER.
    pub trust_chain: &'a Path,
    /// Exact bytes of `manifest.json`.
    pub manifest: &'a [u8],
    /// The same bytes as staged in the working area.
    pub manifest_path: &'a Path,
}

/// Credential extraction and detached signing.
///
/// Implementations must sign the manifest bytes exactly as given (binary
/// mode, no line-ending conversion), must not embed the manifest in the
/// signature (detached), and must return DER.
pub trait SigningBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Export the signer certificate and private key from the store.
    ///
    /// All written material must stay inside `area`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Credential`] if the store cannot be opened or
    /// decoded.
    fn extract_credentials(
        &self,
        store: &CredentialStore,
        area: &WorkingArea,
    ) -> Result<ExportedCredentials>;

    /// Produce a DER-encoded detached PKCS#7 signature over the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Signing`] if signing fails.
    fn sign_detached(&self, request: &DetachedSignRequest<'_>) -> Result<Vec<u8>>;
}
