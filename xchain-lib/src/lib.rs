//! xchain-lib: X.509 certificate chain building and policy verification.
//!
//! Given a leaf certificate, a pool of untrusted intermediates and a store of
//! trust anchors, [`Verifier`] searches for a signature-valid path to a root
//! and evaluates each complete candidate path against a [`VerifierPolicy`].
//! The first path that satisfies the policy wins; otherwise every policy
//! rejection encountered along the way is reported.
//!
//! Policy evaluation is asynchronous so that policies may perform I/O (for
//! example a revocation lookup) without blocking other validations.

mod convert;
mod fields;
mod fingerprint;
pub mod oid;
mod parser;
mod util;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use convert::{der_to_pem, pem_to_der};
pub use fields::{
    BasicConstraints, Certificate, DistinguishedName, Extension, ExtensionDecodeError, KeyUsage,
};
pub use fingerprint::{compute_fingerprint, fingerprint_hex};
pub use parser::{parse_cert, parse_der, parse_pem, parse_pem_chain};
pub use verify::{
    find_system_ca_bundle, BasicConstraintsPolicy, CertificateStore, Chain, ChainCertInfo,
    CriticalExtensionsPolicy, ExpiryPolicy, KeyUsagePolicy, PolicyFailure, PolicyOutcome,
    PolicySet, PolicyViolation, Rfc5280Policy, SignatureVerifier, VerificationResult, Verifier,
    VerifierPolicy, X509SignatureVerifier, MAX_CHAIN_DEPTH, MAX_SIGNATURE_CHECKS,
};

/// Errors returned by xchain-lib.
#[derive(Debug, thiserror::Error)]
pub enum XchainError {
    #[error("Failed to parse certificate: {0}")]
    ParseError(String),

    #[error("Invalid PEM format: {0}")]
    PemError(String),

    #[error("Invalid DER format: {0}")]
    DerError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Trust store error: {0}")]
    TrustStore(String),

    #[error("Verification cancelled")]
    Cancelled,
}
