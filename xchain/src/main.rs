//! xchain: Command-line tool for building and verifying X.509 certificate chains.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinSet;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use xchain_lib::{Certificate, CertificateStore, Rfc5280Policy, VerificationResult, Verifier};

#[derive(Parser)]
#[command(
    name = "xchain",
    version,
    about = "Build and verify X.509 certificate chains",
    long_about = "xchain searches for a path from a leaf certificate to a trusted root,\n\
                  trying every candidate issuer (including cross-signed and re-keyed\n\
                  CAs) and checking each complete path against RFC 5280 rules:\n\
                  validity dates, basic constraints, path length, key usage and\n\
                  critical extensions.",
    after_help = "EXAMPLES:\n\
                  \n  xchain verify chain.pem\
                  \n  xchain verify --CAfile ca.pem --untrusted int.pem leaf.pem\
                  \n  xchain verify --attime 2024-01-01T00:00:00Z --json chain.pem\
                  \n  xchain --log-level debug verify chain.pem\
                  \n  cat chain.pem | xchain verify"
)]
struct Cli {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a certificate chain against a trust store (exit 0 = valid, 2 = fail)
    #[command(
        after_help = "FILE is a PEM bundle with the leaf certificate first; any further\n\
                      certificates are treated as untrusted intermediates. A single DER\n\
                      certificate is also accepted. Uses the system trust store unless\n\
                      --CAfile is given.\n\
                      \nEXAMPLES:\n\
                      \n  xchain verify chain.pem\
                      \n  xchain verify --CAfile ca.pem --untrusted int.pem leaf.pem\
                      \n  xchain verify --max-chain-length 4 --show-chain chain.pem\
                      \n  xchain verify --failures-only -r certs/"
    )]
    Verify {
        /// PEM/DER file or directory with certificate chain(s).
        /// Reads from stdin if omitted.
        file: Option<PathBuf>,
        /// PEM file containing trusted CA certificates (default: system trust store)
        #[arg(long = "CAfile", visible_alias = "ca-file", value_name = "FILE")]
        ca_file: Option<PathBuf>,
        /// Directory of trusted CA certificates in PEM format
        #[arg(long = "CApath", visible_alias = "ca-path", value_name = "DIR")]
        ca_path: Option<PathBuf>,
        /// PEM file with untrusted intermediate certificates
        #[arg(long, value_name = "FILE")]
        untrusted: Option<PathBuf>,
        /// Verify at a specific time: Unix seconds or RFC 3339 (default: now)
        #[arg(long, value_name = "TIME", value_parser = parse_attime)]
        attime: Option<i64>,
        /// Longest chain to consider, leaf and root included
        #[arg(long, value_name = "N", default_value_t = xchain_lib::MAX_CHAIN_DEPTH)]
        max_chain_length: usize,
        /// Display subject and issuer for each certificate in the verified chain
        #[arg(long)]
        show_chain: bool,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Only print failures (directory mode)
        #[arg(long)]
        failures_only: bool,
        /// Recurse into subdirectories (directory mode)
        #[arg(short, long)]
        recurse: bool,
    },
}

/// Maximum file size for certificate inputs (10 MiB).
const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

fn read_input(file: Option<&PathBuf>) -> Result<Vec<u8>> {
    match file {
        Some(path) => {
            let meta = std::fs::metadata(path)
                .with_context(|| format!("Failed to stat file: {}", path.display()))?;
            if meta.len() > MAX_INPUT_BYTES {
                anyhow::bail!(
                    "File too large ({} bytes, max {} bytes): {}",
                    meta.len(),
                    MAX_INPUT_BYTES,
                    path.display()
                );
            }
            std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))
        }
        None => {
            let mut buf = Vec::new();
            std::io::stdin()
                .take(MAX_INPUT_BYTES)
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

/// Parse a validation time.
///
/// Plain integers are Unix seconds. Otherwise an RFC 3339 timestamp is
/// expected (e.g. "2024-01-01T00:00:00Z"; the `T` and `Z` may be omitted).
fn parse_attime(s: &str) -> Result<i64> {
    if let Ok(secs) = s.parse::<i64>() {
        return Ok(secs);
    }
    let ts = humantime::parse_rfc3339_weak(s).with_context(|| format!("Invalid time: '{s}'"))?;
    let secs = ts
        .duration_since(UNIX_EPOCH)
        .with_context(|| format!("Time before 1970 must be given in seconds: '{s}'"))?
        .as_secs();
    i64::try_from(secs).with_context(|| format!("Time out of range: '{s}'"))
}

fn now_unix() -> Result<i64> {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before 1970")?
        .as_secs();
    Ok(i64::try_from(secs)?)
}

/// Split input into the leaf and the certificates that follow it.
///
/// PEM input may hold a whole bundle; anything else is parsed as a single
/// certificate.
fn parse_bundle(data: &[u8]) -> Result<(Certificate, Vec<Certificate>)> {
    let ders = match xchain_lib::parse_pem_chain(data) {
        Ok(ders) => ders,
        Err(_) => {
            let leaf = xchain_lib::parse_cert(data).context("Failed to parse certificate")?;
            return Ok((leaf, Vec::new()));
        }
    };
    let mut certs = ders
        .iter()
        .map(|der| xchain_lib::parse_der(der))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to parse certificate in bundle")?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in input");
    }
    let leaf = certs.remove(0);
    Ok((leaf, certs))
}

fn load_roots(ca_file: Option<&Path>, ca_path: Option<&Path>) -> Result<CertificateStore> {
    let mut roots = match ca_file {
        Some(path) => CertificateStore::from_pem_file(path)
            .with_context(|| format!("Failed to load CA file: {}", path.display()))?,
        None if ca_path.is_some() => CertificateStore::new(),
        None => CertificateStore::system().context("Failed to load system trust store")?,
    };
    if let Some(dir) = ca_path {
        roots
            .add_pem_directory(dir)
            .with_context(|| format!("Failed to load CA directory: {}", dir.display()))?;
    }
    tracing::debug!(roots = roots.len(), "trust store loaded");
    Ok(roots)
}

/// Shared settings for one or many validations.
#[derive(Clone)]
struct VerifyContext {
    roots: Arc<CertificateStore>,
    untrusted: Arc<CertificateStore>,
    at: i64,
    max_chain_length: usize,
}

impl VerifyContext {
    async fn verify(&self, data: &[u8]) -> Result<VerificationResult> {
        let (leaf, rest) = parse_bundle(data)?;
        let mut intermediates = (*self.untrusted).clone();
        for cert in rest {
            intermediates.insert(cert);
        }
        let mut verifier = Verifier::new(Arc::clone(&self.roots), Rfc5280Policy::new(self.at))
            .with_max_chain_length(self.max_chain_length);
        Ok(verifier.validate(&leaf, &intermediates).await)
    }
}

/// Check if a path has a certificate file extension.
fn is_cert_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("pem") || ext.eq_ignore_ascii_case("der")
            || ext.eq_ignore_ascii_case("crt") || ext.eq_ignore_ascii_case("cer")
    )
}

/// Find all certificate files (.pem, .der, .crt, .cer) in a directory.
fn find_cert_files(dir: &Path, recurse: bool) -> Vec<PathBuf> {
    let walker = if recurse {
        walkdir::WalkDir::new(dir)
    } else {
        walkdir::WalkDir::new(dir).max_depth(1)
    };
    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_cert_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// A single result from batch processing.
struct BatchResult {
    path: String,
    pass: bool,
    detail: String,
}

impl BatchResult {
    fn from_verify(path: String, result: Result<VerificationResult>) -> Self {
        match result {
            Ok(r) => BatchResult {
                path,
                pass: r.is_valid(),
                detail: r.to_string(),
            },
            Err(e) => BatchResult {
                path,
                pass: false,
                detail: format!("FAIL ({:#})", e),
            },
        }
    }
}

/// Verify every file concurrently, printing `filename: result` in file order.
///
/// Returns the number of failures.
async fn run_batch(files: Vec<PathBuf>, ctx: VerifyContext, failures_only: bool) -> Result<usize> {
    let mut tasks = JoinSet::new();
    for (idx, path) in files.into_iter().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move {
            let label = path.display().to_string();
            let result = match std::fs::read(&path) {
                Ok(data) => ctx.verify(&data).await,
                Err(e) => Err(anyhow::Error::new(e).context("read error")),
            };
            (idx, BatchResult::from_verify(label, result))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        results.push(joined.context("verification task failed")?);
    }
    results.sort_by_key(|(idx, _)| *idx);

    let mut failures = 0;
    for (_, r) in &results {
        if !r.pass {
            failures += 1;
        }
        if failures_only && r.pass {
            continue;
        }
        if r.pass {
            println!("{}: {}", r.path, r.detail);
        } else {
            eprintln!("{}: {}", r.path, r.detail);
        }
    }
    Ok(failures)
}

/// Print a single-file verification result (JSON, text valid, or text invalid).
fn print_verify_result(
    label: &str,
    result: &VerificationResult,
    json: bool,
    show_chain: bool,
) -> Result<()> {
    if json {
        println!("{}", result.to_json()?);
    } else if let Some(chain) = result.chain() {
        println!("{}: {}", label, result);
        if show_chain {
            for info in chain.describe() {
                println!(
                    "depth {}: subject = {}, issuer = {}",
                    info.depth, info.subject, info.issuer
                );
            }
        }
    } else {
        eprintln!("{}: {}", label, result);
    }
    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Verify {
            file,
            ca_file,
            ca_path,
            untrusted,
            attime,
            max_chain_length,
            show_chain,
            json,
            failures_only,
            recurse,
        } => {
            let roots = load_roots(ca_file.as_deref(), ca_path.as_deref())?;
            let untrusted = match untrusted.as_ref() {
                Some(path) => CertificateStore::from_pem_file(path).with_context(|| {
                    format!("Failed to read untrusted file: {}", path.display())
                })?,
                None => CertificateStore::new(),
            };
            let at = match attime {
                Some(at) => at,
                None => now_unix()?,
            };
            let ctx = VerifyContext {
                roots: Arc::new(roots),
                untrusted: Arc::new(untrusted),
                at,
                max_chain_length,
            };

            // Directory mode: verify all cert files concurrently
            if let Some(path) = file.as_ref().filter(|p| p.is_dir()) {
                let files = find_cert_files(path, recurse);
                if files.is_empty() {
                    anyhow::bail!(
                        "No certificate files (.pem, .der, .crt, .cer) found in {}",
                        path.display()
                    );
                }
                let failures = run_batch(files, ctx, failures_only).await?;
                if failures > 0 {
                    std::process::exit(2);
                }
                return Ok(());
            }

            // Single file mode
            let input = read_input(file.as_ref())?;
            let label = file
                .as_ref()
                .map_or("stdin".to_string(), |f| f.display().to_string());
            let result = ctx.verify(&input).await?;
            print_verify_result(&label, &result, json, show_chain)?;
            if !result.is_valid() {
                std::process::exit(2);
            }
        }
    }

    Ok(())
}
