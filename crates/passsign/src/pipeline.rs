//! Pass signing pipeline.
//!
//! [`PassSigner`] ties the pieces together for one request:
//!
//! 1. Validate the configuration
//! 2. Parse `pass.json`
//! 3. Check its pass type and team identifiers
//! 4. Stage the bundle in a fresh [`WorkingArea`]
//! 5. Compute and serialize `manifest.json`
//! 6. Export the signing credentials
//! 7. Sign the manifest (detached, binary, DER)
//! 8. Assemble the `.pkpass` archive
//! 9. Return the archive bytes
//! 10. Remove the working area
//!
//! Steps 1-3 fail with their own error kinds and never touch the
//! filesystem. Any failure from step 4 on is reported as
//! [`Error::SignFailed`] carrying the cause.

use crate::archive::build_pkpass;
use crate::bundle::{compute_manifest, Manifest, PassBundle, PassDescriptor, MANIFEST_JSON, SIGNATURE};
use crate::config::{SignerConfig, ValidatedConfig};
use crate::crypto::{DetachedSignRequest, OpensslBackend, SigningBackend};
use crate::request::DecodedRequest;
use crate::workspace::WorkingArea;
use crate::{Error, Result};
use std::sync::Arc;

/// A signed pass ready to be served.
#[derive(Debug, Clone)]
pub struct SignedPass {
    /// The `.pkpass` archive bytes.
    pub archive: Vec<u8>,
    /// The manifest that was signed.
    pub manifest: Manifest,
}

impl SignedPass {
    /// Media type of a `.pkpass` archive.
    pub const CONTENT_TYPE: &'static str = "application/vnd.apple.pkpass";
}

/// Signs pass bundles.
///
/// Cheap to clone; the configuration is read-only and the backend is shared.
/// Concurrent calls to [`PassSigner::sign`] each get their own working area.
///
/// # Example
///
/// ```no_run
/// use passsign::{PassSigner, SignerConfig};
///
/// let signer = PassSigner::new(SignerConfig::from_env());
/// let descriptor = std::fs::read("pass.json")?;
/// let icon = std::fs::read("icon.png")?;
///
/// let pass = signer.sign(&descriptor, vec![("icon.png".to_string(), icon)])?;
/// std::fs::write("card.pkpass", &pass.archive)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct PassSigner {
    config: SignerConfig,
    backend: Arc<dyn SigningBackend>,
}

impl PassSigner {
    /// Create a signer using the in-process OpenSSL backend.
    pub fn new(config: SignerConfig) -> Self {
        Self {
            config,
            backend: Arc::new(OpensslBackend::new()),
        }
    }

    /// Replace the signing backend.
    pub fn backend(mut self, backend: impl SigningBackend + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    /// The configuration this signer was built with.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Sign a descriptor and its assets.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if required settings are missing
    /// - [`Error::InvalidPassJson`] if the descriptor is empty or not a JSON object
    /// - [`Error::IdentifierMismatch`] if its identifiers differ from the configuration
    /// - [`Error::InvalidRequest`] if an asset name is unusable
    /// - [`Error::SignFailed`] for anything that fails afterwards
    pub fn sign<I>(&self, descriptor: &[u8], assets: I) -> Result<SignedPass>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let config = self.config.validate()?;

        let pass = PassDescriptor::parse(descriptor)?;
        pass.check_identity(&config.identity)?;

        let bundle = PassBundle::new(descriptor.to_vec(), assets)?;

        self.sign_validated(&config, &pass, &bundle)
    }

    /// Sign a bundle that was already assembled, e.g. by [`PassBundle::from_dir`].
    pub fn sign_bundle(&self, bundle: &PassBundle) -> Result<SignedPass> {
        let config = self.config.validate()?;

        let pass = PassDescriptor::parse(bundle.descriptor())?;
        pass.check_identity(&config.identity)?;

        self.sign_validated(&config, &pass, bundle)
    }

    /// Sign a request decoded by a transport.
    pub fn sign_request(&self, request: DecodedRequest) -> Result<SignedPass> {
        self.sign(&request.descriptor, request.assets)
    }

    fn sign_validated(
        &self,
        config: &ValidatedConfig,
        pass: &PassDescriptor,
        bundle: &PassBundle,
    ) -> Result<SignedPass> {
        let span = tracing::info_span!(
            "sign_pass",
            serial = pass.serial_number.as_deref().unwrap_or("-"),
            backend = self.backend.name(),
        );
        let _enter = span.enter();

        tracing::info!(
            files = bundle.len(),
            bytes = bundle.total_size(),
            "signing pass"
        );

        let area = WorkingArea::create(config.work_dir.as_deref()).map_err(Error::sign_failed)?;
        let result = self.run(config, bundle, &area);

        let area_path = area.path().to_path_buf();
        if let Err(e) = area.close() {
            tracing::error!(path = %area_path.display(), error = %e, "failed to remove working area");
        }

        match result {
            Ok(signed) => {
                tracing::info!(archive_bytes = signed.archive.len(), "pass signed");
                Ok(signed)
            }
            Err(e) => {
                tracing::error!(error = %e, "pass signing failed");
                Err(e.sign_failed())
            }
        }
    }

    fn run(&self, config: &ValidatedConfig, bundle: &PassBundle, area: &WorkingArea) -> Result<SignedPass> {
        for (name, data) in bundle.files() {
            area.stage(name, data)?;
        }

        let manifest = compute_manifest(bundle.files());
        let manifest_json = manifest.to_json()?;
        let manifest_path = area.stage(MANIFEST_JSON, &manifest_json)?;
        tracing::debug!(entries = manifest.len(), "manifest computed");

        let credentials = self
            .backend
            .extract_credentials(&config.credential_store, area)?;
        tracing::debug!("credentials exported");

        let signature = self.backend.sign_detached(&DetachedSignRequest {
            credentials: &credentials,
            trust_chain: &config.trust_chain,
            manifest: &manifest_json,
            manifest_path: &manifest_path,
        })?;
        area.stage(SIGNATURE, &signature)?;
        tracing::debug!(signature_bytes = signature.len(), "manifest signed");

        let entries = bundle
            .files()
            .chain([(MANIFEST_JSON, manifest_json.as_slice()), (SIGNATURE, signature.as_slice())]);
        let archive = build_pkpass(entries, config.compression_level)?;

        Ok(SignedPass { archive, manifest })
    }
}

impl std::fmt::Debug for PassSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassSigner")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}
