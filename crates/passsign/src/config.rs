//! Signer configuration.
//!
//! [`SignerConfig`] is built once (usually from the process environment) and
//! handed to [`crate::PassSigner`]. It is checked on every signing request
//! with [`SignerConfig::validate`], which turns it into a [`ValidatedConfig`]
//! whose fields are all present.

use crate::archive::CompressionLevel;
use crate::crypto::CredentialStore;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};

/// Environment variable holding the PKCS#12 credential store path.
pub const ENV_P12_PATH: &str = "PASS_CERT_P12_PATH";
/// Environment variable holding the credential store passphrase.
pub const ENV_P12_PASSWORD: &str = "PASS_CERT_P12_PASSWORD";
/// Environment variable holding the trust-chain (WWDR) certificate path.
pub const ENV_WWDR_CERT_PATH: &str = "WWDR_CERT_PATH";
/// Environment variable holding the expected pass type identifier.
pub const ENV_PASS_TYPE_IDENTIFIER: &str = "PASS_TYPE_IDENTIFIER";
/// Environment variable holding the expected team identifier.
pub const ENV_TEAM_IDENTIFIER: &str = "TEAM_IDENTIFIER";
/// Environment variable holding the organization name.
pub const ENV_ORGANIZATION_NAME: &str = "ORGANIZATION_NAME";
/// Environment variable holding the archive compression level (0-9).
pub const ENV_ZIP_LEVEL: &str = "PASS_ZIP_LEVEL";
/// Environment variable holding the root directory for working areas.
pub const ENV_WORK_DIR: &str = "PASS_WORK_DIR";

/// Identity every signed descriptor must declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassIdentity {
    /// Expected `passTypeIdentifier`.
    pub pass_type_identifier: String,
    /// Expected `teamIdentifier`.
    pub team_identifier: String,
}

/// Pass signer configuration with builder-style setters.
///
/// Every field is optional here; missing values are reported all at once by
/// [`SignerConfig::validate`].
///
/// # Example
///
/// ```
/// use passsign::SignerConfig;
///
/// let config = SignerConfig::new()
///     .credential_store("pass.p12")
///     .passphrase("secret")
///     .trust_chain("wwdr.pem")
///     .pass_type_identifier("pass.com.example.card")
///     .team_identifier("ABCDE12345");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignerConfig {
    credential_store: Option<PathBuf>,
    passphrase: Option<SecretString>,
    trust_chain: Option<PathBuf>,
    pass_type_identifier: Option<String>,
    team_identifier: Option<String>,
    organization_name: String,
    compression_level: CompressionLevel,
    work_dir: Option<PathBuf>,
}

/// Configuration with every required setting present.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Credential store and its passphrase.
    pub credential_store: CredentialStore,
    /// Trust-chain certificate file (PEM or DER).
    pub trust_chain: PathBuf,
    /// Identity descriptors must match.
    pub identity: PassIdentity,
    /// Informational only.
    pub organization_name: String,
    /// Archive compression level.
    pub compression_level: CompressionLevel,
    /// Where working areas are created; the system temp dir when `None`.
    pub work_dir: Option<PathBuf>,
}

impl SignerConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Empty values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let compression_level = match get(ENV_ZIP_LEVEL).map(|raw| raw.trim().parse::<u32>()) {
            Some(Ok(level)) => CompressionLevel::new(level),
            Some(Err(_)) => {
                tracing::warn!(variable = ENV_ZIP_LEVEL, "ignoring unparsable compression level");
                CompressionLevel::DEFAULT
            }
            None => CompressionLevel::DEFAULT,
        };

        Self {
            credential_store: get(ENV_P12_PATH).map(PathBuf::from),
            passphrase: get(ENV_P12_PASSWORD).map(SecretString::new),
            trust_chain: get(ENV_WWDR_CERT_PATH).map(PathBuf::from),
            pass_type_identifier: get(ENV_PASS_TYPE_IDENTIFIER),
            team_identifier: get(ENV_TEAM_IDENTIFIER),
            organization_name: get(ENV_ORGANIZATION_NAME).unwrap_or_default(),
            compression_level,
            work_dir: get(ENV_WORK_DIR).map(PathBuf::from),
        }
    }

    /// Set the PKCS#12 credential store path.
    pub fn credential_store(mut self, path: impl AsRef<Path>) -> Self {
        self.credential_store = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the credential store passphrase.
    ///
    /// The passphrase is stored securely and will be zeroized when dropped.
    pub fn passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(SecretString::new(passphrase.into()));
        self
    }

    /// Set the trust-chain (intermediate) certificate path.
    pub fn trust_chain(mut self, path: impl AsRef<Path>) -> Self {
        self.trust_chain = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the expected pass type identifier.
    pub fn pass_type_identifier(mut self, id: impl Into<String>) -> Self {
        self.pass_type_identifier = Some(id.into());
        self
    }

    /// Set the expected team identifier.
    pub fn team_identifier(mut self, id: impl Into<String>) -> Self {
        self.team_identifier = Some(id.into());
        self
    }

    /// Set the organization name.
    pub fn organization_name(mut self, name: impl Into<String>) -> Self {
        self.organization_name = name.into();
        self
    }

    /// Set ZIP compression level for the archive (0-9).
    pub fn compression_level(mut self, level: impl Into<CompressionLevel>) -> Self {
        self.compression_level = level.into();
        self
    }

    /// Set the directory under which working areas are created.
    pub fn work_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.work_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// The organization name, possibly empty.
    pub fn organization(&self) -> &str {
        &self.organization_name
    }

    /// Check that every required setting is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming every missing setting.
    pub fn validate(&self) -> Result<ValidatedConfig> {
        let mut missing = Vec::new();

        if self.credential_store.is_none() {
            missing.push(ENV_P12_PATH);
        }
        let passphrase = self
            .passphrase
            .as_ref()
            .filter(|secret| !secret.expose_secret().is_empty());
        if passphrase.is_none() {
            missing.push(ENV_P12_PASSWORD);
        }
        if self.trust_chain.is_none() {
            missing.push(ENV_WWDR_CERT_PATH);
        }
        let pass_type = self.pass_type_identifier.as_ref().filter(|v| !v.is_empty());
        if pass_type.is_none() {
            missing.push(ENV_PASS_TYPE_IDENTIFIER);
        }
        let team = self.team_identifier.as_ref().filter(|v| !v.is_empty());
        if team.is_none() {
            missing.push(ENV_TEAM_IDENTIFIER);
        }

        match (&self.credential_store, passphrase, &self.trust_chain, pass_type, team) {
            (Some(store), Some(passphrase), Some(trust_chain), Some(pass_type), Some(team)) => {
                Ok(ValidatedConfig {
                    credential_store: CredentialStore::new(store, passphrase.clone()),
                    trust_chain: trust_chain.clone(),
                    identity: PassIdentity {
                        pass_type_identifier: pass_type.clone(),
                        team_identifier: team.clone(),
                    },
                    organization_name: self.organization_name.clone(),
                    compression_level: self.compression_level,
                    work_dir: self.work_dir.clone(),
                })
            }
            _ => Err(Error::Config { missing }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_P12_PATH, "/etc/pass/pass.p12"),
            (ENV_P12_PASSWORD, "hunter2"),
            (ENV_WWDR_CERT_PATH, "/etc/pass/wwdr.pem"),
            (ENV_PASS_TYPE_IDENTIFIER, "pass.com.example.card"),
            (ENV_TEAM_IDENTIFIER, "ABCDE12345"),
        ]
    }

    #[test]
    fn test_from_lookup_complete() {
        let config = SignerConfig::from_lookup(lookup_from(&complete()));
        let validated = config.validate().unwrap();

        assert_eq!(validated.credential_store.path(), Path::new("/etc/pass/pass.p12"));
        assert_eq!(validated.credential_store.passphrase().expose_secret(), "hunter2");
        assert_eq!(validated.trust_chain, PathBuf::from("/etc/pass/wwdr.pem"));
        assert_eq!(validated.identity.pass_type_identifier, "pass.com.example.card");
        assert_eq!(validated.identity.team_identifier, "ABCDE12345");
        assert_eq!(validated.organization_name, "");
        assert_eq!(validated.compression_level.level(), 6);
        assert!(validated.work_dir.is_none());
    }

    #[test]
    fn test_validate_lists_every_missing_field() {
        let config = SignerConfig::from_lookup(lookup_from(&[(ENV_P12_PASSWORD, "hunter2")]));
        match config.validate() {
            Err(Error::Config { missing }) => assert_eq!(
                missing,
                vec![
                    ENV_P12_PATH,
                    ENV_WWDR_CERT_PATH,
                    ENV_PASS_TYPE_IDENTIFIER,
                    ENV_TEAM_IDENTIFIER
                ]
            ),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_values_count_as_missing() {
        let mut pairs = complete();
        pairs.retain(|(k, _)| *k != ENV_TEAM_IDENTIFIER);
        pairs.push((ENV_TEAM_IDENTIFIER, ""));
        let config = SignerConfig::from_lookup(lookup_from(&pairs));

        match config.validate() {
            Err(Error::Config { missing }) => assert_eq!(missing, vec![ENV_TEAM_IDENTIFIER]),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_passphrase_from_builder_is_missing() {
        let config = SignerConfig::new()
            .credential_store("pass.p12")
            .passphrase("")
            .trust_chain("wwdr.pem")
            .pass_type_identifier("pass.com.example.card")
            .team_identifier("ABCDE12345");

        match config.validate() {
            Err(Error::Config { missing }) => assert_eq!(missing, vec![ENV_P12_PASSWORD]),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_optional_settings() {
        let mut pairs = complete();
        pairs.push((ENV_ORGANIZATION_NAME, "Example Corp"));
        pairs.push((ENV_ZIP_LEVEL, "12"));
        pairs.push((ENV_WORK_DIR, "/var/tmp/passsign"));
        let validated = SignerConfig::from_lookup(lookup_from(&pairs)).validate().unwrap();

        assert_eq!(validated.organization_name, "Example Corp");
        assert_eq!(validated.compression_level.level(), 9);
        assert_eq!(validated.work_dir, Some(PathBuf::from("/var/tmp/passsign")));
    }

    #[test]
    fn test_unparsable_zip_level_falls_back() {
        let mut pairs = complete();
        pairs.push((ENV_ZIP_LEVEL, "fast"));
        let validated = SignerConfig::from_lookup(lookup_from(&pairs)).validate().unwrap();
        assert_eq!(validated.compression_level.level(), 6);
    }

    #[test]
    fn test_debug_redacts_passphrase() {
        let config = SignerConfig::new().passphrase("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
    }
}
