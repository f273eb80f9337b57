//! Certificate stores indexed by subject name.
//!
//! Provides [`CertificateStore`] for holding trust anchors or untrusted
//! intermediates, plus system trust store discovery matching OpenSSL's
//! lookup behavior.

use crate::fields::{Certificate, DistinguishedName};
use crate::XchainError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Well-known CA bundle file paths, in order of preference.
pub(crate) const KNOWN_CA_BUNDLE_PATHS: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt", // Debian/Ubuntu
    "/etc/pki/tls/certs/ca-bundle.crt",   // RHEL/CentOS/Fedora
    "/etc/ssl/ca-bundle.pem",             // openSUSE
    "/etc/ssl/cert.pem",                  // macOS, Alpine
];

/// Well-known CA certificate directory paths.
pub(crate) const KNOWN_CA_DIR_PATHS: &[&str] = &["/etc/ssl/certs"];

/// Matches `.pem`, `.crt`, `.cer` extensions and OpenSSL hash-linked files
/// (`XXXXXXXX.N` where the extension is a single digit).
pub(crate) fn is_pem_cert_file(path: &Path) -> bool {
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(e) => e,
        None => return false,
    };
    matches!(ext, "pem" | "crt" | "cer")
        || (ext.len() == 1 && ext.bytes().next().is_some_and(|b| b.is_ascii_digit()))
}

/// A pool of certificates, looked up by subject name.
///
/// Several certificates may share a subject (re-keyed or cross-signed CAs);
/// lookups return all of them in insertion order. Inserting a certificate
/// whose DER is already present is a no-op.
#[derive(Clone, Default)]
pub struct CertificateStore {
    by_subject: HashMap<DistinguishedName, Vec<Certificate>>,
    /// Insertion order as (subject, index into that subject's bucket).
    order: Vec<(DistinguishedName, usize)>,
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("count", &self.len())
            .field("subjects", &self.by_subject.len())
            .finish()
    }
}

impl CertificateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from any collection of certificates. Never fails.
    pub fn from_certificates<I>(certs: I) -> Self
    where
        I: IntoIterator<Item = Certificate>,
    {
        let mut store = Self::new();
        for cert in certs {
            store.insert(cert);
        }
        store
    }

    /// Add a certificate. Returns `false` if an identical certificate was
    /// already present.
    pub fn insert(&mut self, cert: Certificate) -> bool {
        let bucket = self.by_subject.entry(cert.subject().clone()).or_default();
        if bucket.contains(&cert) {
            return false;
        }
        self.order.push((cert.subject().clone(), bucket.len()));
        bucket.push(cert);
        true
    }

    /// All certificates whose subject equals `subject`, in insertion order.
    pub fn certificates(&self, subject: &DistinguishedName) -> &[Certificate] {
        self.by_subject
            .get(subject)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether this exact certificate (DER equality) is in the store.
    pub fn contains(&self, cert: &Certificate) -> bool {
        self.certificates(cert.subject()).contains(cert)
    }

    /// Iterate over all certificates in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Certificate> + '_ {
        self.order.iter().filter_map(move |(subject, idx)| {
            self.by_subject.get(subject).and_then(|bucket| bucket.get(*idx))
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Load the system trust store.
    ///
    /// Uses `openssl-probe` and environment variables to find the CA bundle,
    /// matching the same locations OpenSSL searches:
    /// 1. `SSL_CERT_FILE` environment variable
    /// 2. Path discovered by `openssl-probe`
    /// 3. Well-known bundle file paths ([`KNOWN_CA_BUNDLE_PATHS`])
    /// 4. `SSL_CERT_DIR` environment variable
    /// 5. Directory discovered by `openssl-probe`
    /// 6. Well-known certificate directories ([`KNOWN_CA_DIR_PATHS`])
    pub fn system() -> Result<Self, XchainError> {
        let mut store = CertificateStore::new();

        if let Some(bundle_path) = find_system_ca_bundle() {
            if let Ok(data) = std::fs::read(&bundle_path) {
                let added = store.add_pem_bundle(&data)?;
                if added > 0 {
                    tracing::debug!(
                        path = %bundle_path.display(),
                        added,
                        "loaded system CA bundle"
                    );
                    return Ok(store);
                }
            }
        }

        let probe = openssl_probe::probe();
        let dir_candidates = std::env::var("SSL_CERT_DIR")
            .ok()
            .into_iter()
            .chain(
                probe
                    .cert_dir
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned()),
            )
            .chain(KNOWN_CA_DIR_PATHS.iter().map(|s| (*s).to_string()));

        for dir in dir_candidates {
            if let Ok(added) = store.add_pem_directory(Path::new(&dir)) {
                if added > 0 {
                    tracing::debug!(dir = %dir, added, "loaded system CA directory");
                    return Ok(store);
                }
            }
        }

        Err(XchainError::TrustStore("no system trust store found".into()))
    }

    /// Create a store from a PEM bundle.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, XchainError> {
        let mut store = CertificateStore::new();
        store.add_pem_bundle(pem_data)?;
        Ok(store)
    }

    /// Create a store from a PEM file path.
    pub fn from_pem_file(path: &Path) -> Result<Self, XchainError> {
        let data = std::fs::read(path).map_err(|e| {
            XchainError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Self::from_pem(&data)
    }

    /// Add all certificates from a PEM bundle. Returns the number of
    /// certificates actually added (skipping those that fail to parse and
    /// exact duplicates).
    pub fn add_pem_bundle(&mut self, pem_data: &[u8]) -> Result<usize, XchainError> {
        let ders = crate::parse_pem_chain(pem_data)?;
        let mut added = 0;
        for der in ders {
            match crate::parse_der(&der) {
                Ok(cert) => {
                    if self.insert(cert) {
                        added += 1;
                    }
                }
                Err(e) => tracing::trace!(error = %e, "skipping unparseable bundle entry"),
            }
        }
        Ok(added)
    }

    /// Load certificates from a directory of PEM files (like OpenSSL's -CApath).
    ///
    /// Reads all `.pem`, `.crt`, `.cer`, and OpenSSL hash-linked files in the
    /// directory, in file name order.
    pub fn add_pem_directory(&mut self, dir: &Path) -> Result<usize, XchainError> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            XchainError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", dir.display(), e),
            ))
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && is_pem_cert_file(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let mut total = 0;
        for path in paths {
            if let Ok(data) = std::fs::read(&path) {
                if let Ok(added) = self.add_pem_bundle(&data) {
                    total += added;
                }
            }
        }
        Ok(total)
    }
}

impl FromIterator<Certificate> for CertificateStore {
    fn from_iter<I: IntoIterator<Item = Certificate>>(iter: I) -> Self {
        Self::from_certificates(iter)
    }
}

/// Find the system CA bundle path (same location OpenSSL uses).
///
/// Checks, in order:
/// 1. `SSL_CERT_FILE` environment variable
/// 2. Path discovered by `openssl-probe`
/// 3. Well-known bundle file paths ([`KNOWN_CA_BUNDLE_PATHS`])
pub fn find_system_ca_bundle() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SSL_CERT_FILE") {
        let p = PathBuf::from(&path);
        if p.exists() {
            return Some(p);
        }
    }

    let probe = openssl_probe::probe();
    if let Some(file) = probe.cert_file {
        let path = PathBuf::from(&file);
        if path.exists() {
            return Some(path);
        }
    }

    KNOWN_CA_BUNDLE_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
