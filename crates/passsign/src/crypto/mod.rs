//! Credential extraction and detached signing.
//!
//! The pipeline talks to cryptography only through [`SigningBackend`]:
//!
//! - [`OpensslBackend`] links OpenSSL in-process (the default)
//! - [`OpensslCommandBackend`] drives the `openssl` executable
//!
//! Both export the certificate and key from the PKCS#12 store into the
//! working area and produce a DER-encoded PKCS#7 signature in binary,
//! detached mode.

pub mod backend;
pub mod command;
pub mod credentials;
pub mod native;

pub use backend::{DetachedSignRequest, SigningBackend};
pub use command::OpensslCommandBackend;
pub use credentials::{CredentialStore, ExportedCredentials};
pub use native::OpensslBackend;
