//! Command-line interface for the passsign pass signer.
//!
//! `passsign sign` turns a flat pass directory into a `.pkpass` file;
//! `passsign serve` runs the HTTP signing service.

mod server;

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use passsign::{OpensslBackend, OpensslCommandBackend, PassBundle, PassSigner, SignerConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "passsign")]
#[command(about = "Apple Wallet pass signing tool", version)]
struct Cli {
    /// Log filter (e.g. "info", "passsign=debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign a pass directory into a .pkpass archive
    Sign {
        /// Directory holding pass.json and its assets
        #[arg(short = 'd', long)]
        pass_dir: PathBuf,

        /// Output file (default: <pass-dir>.pkpass)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        signer: SignerArgs,
    },
    /// Run the HTTP signing service
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,

        /// Largest accepted request body in bytes
        #[arg(long, default_value_t = server::DEFAULT_MAX_BODY_BYTES)]
        max_body_bytes: usize,

        #[command(flatten)]
        signer: SignerArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// In-process OpenSSL
    Native,
    /// The openssl executable
    OpensslCli,
}

/// Signer settings. Anything not given here is read from the environment.
#[derive(Args)]
struct SignerArgs {
    /// Signing backend
    #[arg(long, value_enum, default_value_t = Backend::Native)]
    backend: Backend,

    /// openssl executable used by the openssl-cli backend
    #[arg(long, default_value = "openssl")]
    openssl_bin: PathBuf,

    /// PKCS#12 credential store (PASS_CERT_P12_PATH)
    #[arg(short = 'p', long)]
    p12: Option<PathBuf>,

    /// Credential store passphrase (PASS_CERT_P12_PASSWORD)
    #[arg(long)]
    p12_password: Option<String>,

    /// WWDR intermediate certificate, PEM or DER (WWDR_CERT_PATH)
    #[arg(short = 'w', long)]
    wwdr_cert: Option<PathBuf>,

    /// Expected pass type identifier (PASS_TYPE_IDENTIFIER)
    #[arg(long)]
    pass_type_id: Option<String>,

    /// Expected team identifier (TEAM_IDENTIFIER)
    #[arg(long)]
    team_id: Option<String>,

    /// Organization name (ORGANIZATION_NAME)
    #[arg(long)]
    organization: Option<String>,

    /// ZIP compression level (0-9, default: 6) (PASS_ZIP_LEVEL)
    /// 0 = stored, 9 = maximum compression
    #[arg(short = 'z', long)]
    zip_level: Option<u32>,

    /// Root for per-request working areas (PASS_WORK_DIR)
    #[arg(long)]
    work_dir: Option<PathBuf>,
}

impl SignerArgs {
    fn into_signer(self) -> PassSigner {
        let mut config = SignerConfig::from_env();

        if let Some(path) = self.p12 {
            config = config.credential_store(path);
        }
        if let Some(password) = self.p12_password {
            config = config.passphrase(password);
        }
        if let Some(path) = self.wwdr_cert {
            config = config.trust_chain(path);
        }
        if let Some(id) = self.pass_type_id {
            config = config.pass_type_identifier(id);
        }
        if let Some(id) = self.team_id {
            config = config.team_identifier(id);
        }
        if let Some(name) = self.organization {
            config = config.organization_name(name);
        }
        if let Some(level) = self.zip_level {
            config = config.compression_level(level);
        }
        if let Some(dir) = self.work_dir {
            config = config.work_dir(dir);
        }

        let signer = PassSigner::new(config);
        let signer = match self.backend {
            Backend::Native => signer.backend(OpensslBackend::new()),
            Backend::OpensslCli => signer.backend(OpensslCommandBackend::with_program(self.openssl_bin)),
        };
        tracing::info!(
            backend = signer.backend_name(),
            organization = signer.config().organization(),
            "signer configured"
        );
        signer
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match cli.command {
        Command::Sign {
            pass_dir,
            output,
            signer,
        } => {
            let output = match output {
                Some(output) => output,
                None => default_output(&pass_dir)?,
            };
            sign_dir(&signer.into_signer(), &pass_dir, &output)?;
            println!("Signed: {}", output.display());
        }
        Command::Serve {
            listen,
            max_body_bytes,
            signer,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            let app = server::router(signer.into_signer(), max_body_bytes);
            runtime.block_on(server::serve(listen, app))?;
        }
    }

    Ok(())
}

/// `<pass-dir>.pkpass` next to the directory, resolved so `.` and `..` work.
fn default_output(pass_dir: &Path) -> anyhow::Result<PathBuf> {
    let dir = pass_dir
        .canonicalize()
        .with_context(|| format!("failed to resolve pass directory {}", pass_dir.display()))?;
    let mut name = dir
        .file_name()
        .ok_or_else(|| anyhow!("cannot derive an output name from {}; pass --output", dir.display()))?
        .to_os_string();
    name.push(".pkpass");
    Ok(dir.with_file_name(name))
}

fn sign_dir(signer: &PassSigner, pass_dir: &Path, output: &Path) -> anyhow::Result<()> {
    let bundle = PassBundle::from_dir(pass_dir)
        .with_context(|| format!("failed to read pass directory {}", pass_dir.display()))?;
    let signed = signer.sign_bundle(&bundle)?;
    std::fs::write(output, &signed.archive)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
