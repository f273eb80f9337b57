//! Certificate chain building and policy verification.
//!
//! [`Verifier`] searches for a signature-valid path from a leaf to a trust
//! anchor held in a [`CertificateStore`], and evaluates every complete
//! candidate path against a [`VerifierPolicy`]. The standard RFC 5280
//! policies live in this module too; callers compose them (or their own)
//! with [`PolicySet`].
//!
//! The system trust store location is discovered via `openssl-probe` and
//! environment variables, matching OpenSSL's lookup behavior.

mod chain;
mod checks;
mod helpers;
mod policy;
mod signature;
mod store;

use crate::fields::Certificate;
use crate::fingerprint::fingerprint_hex;
use crate::util;
use crate::XchainError;
use serde::Serialize;

pub use chain::{Verifier, MAX_CHAIN_DEPTH, MAX_SIGNATURE_CHECKS};
pub use checks::{
    BasicConstraintsPolicy, CriticalExtensionsPolicy, ExpiryPolicy, KeyUsagePolicy, Rfc5280Policy,
};
pub use policy::{PolicyFailure, PolicyOutcome, PolicySet, PolicyViolation, VerifierPolicy};
pub use signature::{SignatureVerifier, X509SignatureVerifier};
pub use store::{find_system_ca_bundle, CertificateStore};

/// An ordered certificate path, leaf first and trust anchor last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain(Vec<Certificate>);

impl Chain {
    pub fn new(certs: Vec<Certificate>) -> Self {
        Chain(certs)
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.0
    }

    pub fn into_certificates(self) -> Vec<Certificate> {
        self.0
    }

    pub fn leaf(&self) -> Option<&Certificate> {
        self.0.first()
    }

    /// The trust anchor (last certificate).
    pub fn root(&self) -> Option<&Certificate> {
        self.0.last()
    }

    /// Per-certificate summary, leaf at depth 0.
    pub fn describe(&self) -> Vec<ChainCertInfo> {
        self.0
            .iter()
            .enumerate()
            .map(|(depth, cert)| ChainCertInfo::new(depth, cert))
            .collect()
    }
}

impl std::ops::Deref for Chain {
    type Target = [Certificate];

    fn deref(&self) -> &[Certificate] {
        &self.0
    }
}

impl From<Vec<Certificate>> for Chain {
    fn from(certs: Vec<Certificate>) -> Self {
        Chain(certs)
    }
}

impl Serialize for Chain {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.describe().serialize(serializer)
    }
}

/// Information about a certificate in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainCertInfo {
    /// Position in chain (0 = leaf).
    pub depth: usize,
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Short human-readable name derived from CN, O, or OU.
    pub short_name: String,
    /// Serial number as colon-separated hex (machine-readable).
    pub serial: String,
    /// SHA-256 fingerprint of the DER encoding.
    pub fingerprint: String,
    pub not_before: String,
    pub not_after: String,
}

impl ChainCertInfo {
    fn new(depth: usize, cert: &Certificate) -> Self {
        ChainCertInfo {
            depth,
            subject: cert.subject().to_oneline(),
            issuer: cert.issuer().to_oneline(),
            short_name: cert.short_name(),
            serial: cert.serial_hex(),
            fingerprint: fingerprint_hex(cert.fingerprint()),
            not_before: util::format_timestamp(cert.not_before()),
            not_after: util::format_timestamp(cert.not_after()),
        }
    }
}

/// Final verdict of a [`Verifier::validate`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum VerificationResult {
    /// The first chain found that satisfied the policy.
    ValidCertificate(Chain),
    /// Every policy rejection met during the search, in encounter order.
    /// Empty when no complete chain to a trust anchor was found.
    CouldNotValidate(Vec<PolicyFailure>),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::ValidCertificate(_))
    }

    pub fn chain(&self) -> Option<&Chain> {
        match self {
            VerificationResult::ValidCertificate(chain) => Some(chain),
            VerificationResult::CouldNotValidate(_) => None,
        }
    }

    pub fn failures(&self) -> &[PolicyFailure] {
        match self {
            VerificationResult::ValidCertificate(_) => &[],
            VerificationResult::CouldNotValidate(failures) => failures,
        }
    }

    /// Pretty-printed JSON rendering.
    pub fn to_json(&self) -> Result<String, XchainError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: [short_name], [serial], OK  |  FAIL, [reasons]
        match self {
            VerificationResult::ValidCertificate(chain) => {
                if let Some(leaf) = chain.leaf() {
                    write!(f, "{}, {}, ", leaf.short_name(), leaf.serial_hex())?;
                }
                write!(f, "OK")
            }
            VerificationResult::CouldNotValidate(failures) => {
                write!(f, "FAIL")?;
                if failures.is_empty() {
                    write!(f, ", no chain to a trusted root")
                } else {
                    let reasons: Vec<String> =
                        failures.iter().map(|fail| fail.to_string()).collect();
                    write!(f, ", {}", reasons.join("; "))
                }
            }
        }
    }
}
