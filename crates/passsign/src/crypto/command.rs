//! Backend driving the `openssl` command-line tool.
//!
//! Runs the same three invocations a shell script would:
//!
//! ```text
//! openssl pkcs12 -in pass.p12 -clcerts -nokeys -out pass_cert.pem
//! openssl pkcs12 -in pass.p12 -nocerts -out pass_key.pem
//! openssl smime -binary -sign -certfile wwdr.pem -signer pass_cert.pem \
//!     -inkey pass_key.pem -in manifest.json -out signature -outform DER
//! ```
//!
//! Passphrases are handed over through the child's environment
//! (`-passin env:...`) so they never show up in the process list.

use super::backend::{DetachedSignRequest, SigningBackend};
use super::credentials::{CredentialStore, ExportedCredentials, CERT_FILE, KEY_FILE};
use crate::bundle::SIGNATURE;
use crate::workspace::WorkingArea;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Child environment variable carrying the input passphrase.
const PASSIN_ENV: &str = "PASSSIGN_PASSIN";
/// Child environment variable carrying the output passphrase.
const PASSOUT_ENV: &str = "PASSSIGN_PASSOUT";

/// Signs by running an external `openssl` executable.
#[derive(Debug, Clone)]
pub struct OpensslCommandBackend {
    program: PathBuf,
}

impl OpensslCommandBackend {
    /// Use `openssl` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("openssl")
    }

    /// Use a specific `openssl` binary.
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
        }
    }

    /// The executable that will be run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(
        &self,
        args: Vec<OsString>,
        passin: &SecretString,
        passout: Option<&SecretString>,
    ) -> std::result::Result<(), String> {
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .env(PASSIN_ENV, passin.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(passout) = passout {
            command.env(PASSOUT_ENV, passout.expose_secret());
        }

        let subcommand = args
            .first()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(program = %self.program.display(), subcommand = %subcommand, "running openssl");

        let output = command
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.program.display(), e))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!(
                "openssl {} exited with {}: {}",
                subcommand,
                output.status,
                stderr.trim()
            ))
        }
    }
}

impl Default for OpensslCommandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningBackend for OpensslCommandBackend {
    fn name(&self) -> &'static str {
        "openssl-cli"
    }

    fn extract_credentials(
        &self,
        store: &CredentialStore,
        area: &WorkingArea,
    ) -> Result<ExportedCredentials> {
        // Pre-create the outputs so openssl writes into owner-only files.
        let certificate = area.write_secret(CERT_FILE, b"")?;
        let private_key = area.write_secret(KEY_FILE, b"")?;
        let passphrase = store.passphrase();

        self.run(export_cert_args(store.path(), &certificate), passphrase, None)
            .map_err(Error::Credential)?;
        self.run(
            export_key_args(store.path(), &private_key),
            passphrase,
            Some(passphrase),
        )
        .map_err(Error::Credential)?;

        Ok(ExportedCredentials {
            certificate,
            private_key,
            passphrase: passphrase.clone(),
        })
    }

    fn sign_detached(&self, request: &DetachedSignRequest<'_>) -> Result<Vec<u8>> {
        let signature_path = request.manifest_path.with_file_name(SIGNATURE);
        let args = smime_sign_args(
            &request.credentials.certificate,
            &request.credentials.private_key,
            request.trust_chain,
            request.manifest_path,
            &signature_path,
        );

        self.run(args, &request.credentials.passphrase, None)
            .map_err(Error::Signing)?;

        Ok(fs::read(&signature_path)?)
    }
}

fn passin_arg() -> OsString {
    format!("env:{PASSIN_ENV}").into()
}

fn passout_arg() -> OsString {
    format!("env:{PASSOUT_ENV}").into()
}

fn export_cert_args(store: &Path, out: &Path) -> Vec<OsString> {
    vec![
        "pkcs12".into(),
        "-in".into(),
        store.into(),
        "-clcerts".into(),
        "-nokeys".into(),
        "-out".into(),
        out.into(),
        "-passin".into(),
        passin_arg(),
    ]
}

fn export_key_args(store: &Path, out: &Path) -> Vec<OsString> {
    vec![
        "pkcs12".into(),
        "-in".into(),
        store.into(),
        "-nocerts".into(),
        "-out".into(),
        out.into(),
        "-passin".into(),
        passin_arg(),
        "-passout".into(),
        passout_arg(),
    ]
}

fn smime_sign_args(
    certificate: &Path,
    private_key: &Path,
    trust_chain: &Path,
    manifest: &Path,
    signature: &Path,
) -> Vec<OsString> {
    vec![
        "smime".into(),
        "-binary".into(),
        "-sign".into(),
        "-certfile".into(),
        trust_chain.into(),
        "-signer".into(),
        certificate.into(),
        "-inkey".into(),
        private_key.into(),
        "-passin".into(),
        passin_arg(),
        "-in".into(),
        manifest.into(),
        "-out".into(),
        signature.into(),
        "-outform".into(),
        "DER".into(),
    ]
}
