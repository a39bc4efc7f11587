//! Signs pass bundles into `.pkpass` archives.
//!
//! A pass bundle is a `pass.json` descriptor plus assets. Signing hashes
//! every file into `manifest.json`, signs the manifest with a detached
//! PKCS#7 signature using the pass type certificate, and zips everything
//! into a flat archive.
//!
//! The entry point is [`PassSigner`].

pub mod archive;
pub mod bundle;
pub mod config;
pub mod crypto;
pub mod error;
pub mod pipeline;
pub mod request;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod testing;

pub use archive::{build_pkpass, CompressionLevel};
pub use bundle::{compute_manifest, Manifest, PassBundle, PassDescriptor};
pub use config::{PassIdentity, SignerConfig, ValidatedConfig};
pub use crypto::{OpensslBackend, OpensslCommandBackend, SigningBackend};
pub use error::{Error, ErrorCode, Fault, IdentifierField};
pub use pipeline::{PassSigner, SignedPass};
pub use request::{DecodedRequest, FilePayload, SignRequest};
pub use workspace::WorkingArea;

pub type Result<T> = std::result::Result<T, Error>;
