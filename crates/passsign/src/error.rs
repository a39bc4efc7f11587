//! Error types for pass signing.
//!
//! This module defines the [`enum@Error`] enum covering every failure of the
//! signing pipeline, from request validation to archive assembly, together
//! with the stable [`ErrorCode`] and [`Fault`] classification a transport
//! uses to build its response.
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::fmt;
use thiserror::Error;

/// Descriptor field whose value must equal the configured identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierField {
    /// `passTypeIdentifier` in `pass.json`.
    PassTypeIdentifier,
    /// `teamIdentifier` in `pass.json`.
    TeamIdentifier,
}

impl IdentifierField {
    /// The JSON key of this field inside the descriptor.
    pub fn json_key(self) -> &'static str {
        match self {
            IdentifierField::PassTypeIdentifier => "passTypeIdentifier",
            IdentifierField::TeamIdentifier => "teamIdentifier",
        }
    }
}

impl fmt::Display for IdentifierField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_key())
    }
}

/// Error type for pass signing operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses
/// this error type. Validation failures keep their specific variant; anything
/// that goes wrong once the pipeline has started touching the filesystem is
/// wrapped in [`Error::SignFailed`] with the original error as its source.
///
/// # Examples
///
/// ```no_run
/// use passsign::{Error, PassSigner, SignerConfig};
///
/// let signer = PassSigner::new(SignerConfig::from_env());
/// match signer.sign(br#"{"passTypeIdentifier":"pass.example"}"#, Vec::new()) {
///     Ok(pass) => println!("{} bytes", pass.archive.len()),
///     Err(Error::Config { missing }) => eprintln!("missing settings: {}", missing.join(", ")),
///     Err(e) => eprintln!("{} ({})", e, e.code()),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// Required settings are absent.
    ///
    /// Lists every missing setting by its environment variable name, not
    /// just the first one found.
    #[error("Missing configuration: {}", missing.join(", "))]
    Config {
        /// Environment variable names of the missing settings.
        missing: Vec<&'static str>,
    },

    /// The request itself is malformed.
    ///
    /// Missing descriptor, undecodable file payload, or an asset name that
    /// cannot be stored as a flat archive entry.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The pass descriptor is empty, not UTF-8, or not a JSON object.
    #[error("Invalid pass.json: {0}")]
    InvalidPassJson(String),

    /// The descriptor names a different pass type or team than configured.
    #[error("{field} mismatch")]
    IdentifierMismatch {
        /// Which identifier did not match.
        field: IdentifierField,
    },

    /// The credential store could not be opened or decoded.
    ///
    /// Wrong passphrase, unreadable file, missing certificate or key, or a
    /// key that does not belong to the certificate.
    #[error("Credential error: {0}")]
    Credential(String),

    /// The detached signature could not be produced.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// I/O operation failed.
    ///
    /// Occurs when reading bundle files or writing into the working area.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive operation failed.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Manifest serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A step after validation failed.
    ///
    /// The underlying cause is available through
    /// [`std::error::Error::source`] for diagnostics.
    #[error("Pass signing failed: {0}")]
    SignFailed(#[source] Box<Error>),
}

/// Stable, machine-readable error codes for transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// `config_missing`
    ConfigMissing,
    /// `invalid_request`
    InvalidRequest,
    /// `invalid_pass_json`
    InvalidPassJson,
    /// `pass_type_mismatch`
    PassTypeMismatch,
    /// `team_id_mismatch`
    TeamIdMismatch,
    /// `sign_failed`
    SignFailed,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ConfigMissing => "config_missing",
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidPassJson => "invalid_pass_json",
            ErrorCode::PassTypeMismatch => "pass_type_mismatch",
            ErrorCode::TeamIdMismatch => "team_id_mismatch",
            ErrorCode::SignFailed => "sign_failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The caller sent something unusable.
    Client,
    /// The deployment or the signing machinery is at fault.
    Server,
}

impl Error {
    pub(crate) fn sign_failed(self) -> Self {
        match self {
            Error::SignFailed(_) => self,
            other => Error::SignFailed(Box::new(other)),
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config { .. } => ErrorCode::ConfigMissing,
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::InvalidPassJson(_) => ErrorCode::InvalidPassJson,
            Error::IdentifierMismatch {
                field: IdentifierField::PassTypeIdentifier,
            } => ErrorCode::PassTypeMismatch,
            Error::IdentifierMismatch {
                field: IdentifierField::TeamIdentifier,
            } => ErrorCode::TeamIdMismatch,
            Error::Credential(_)
            | Error::Signing(_)
            | Error::Io(_)
            | Error::Zip(_)
            | Error::Json(_)
            | Error::SignFailed(_) => ErrorCode::SignFailed,
        }
    }

    /// Whether the caller or the service is at fault.
    pub fn fault(&self) -> Fault {
        match self.code() {
            ErrorCode::InvalidRequest
            | ErrorCode::InvalidPassJson
            | ErrorCode::PassTypeMismatch
            | ErrorCode::TeamIdMismatch => Fault::Client,
            ErrorCode::ConfigMissing | ErrorCode::SignFailed => Fault::Server,
        }
    }

    /// Message that is safe to hand back to a caller.
    ///
    /// Signing failures are reported generically; their cause stays in logs.
    pub fn public_message(&self) -> String {
        match self.code() {
            ErrorCode::SignFailed => "Pass signing failed".to_string(),
            ErrorCode::InvalidRequest | ErrorCode::InvalidPassJson => match self {
                Error::InvalidRequest(msg) | Error::InvalidPassJson(msg) => msg.clone(),
                other => other.to_string(),
            },
            _ => self.to_string(),
        }
    }
}
