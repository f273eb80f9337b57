//! Signature verification seam.

use crate::fields::Certificate;
use x509_parser::prelude::*;

/// Checks that a certificate was signed by the holder of a public key.
///
/// The chain builder calls this for every candidate issuer; a `false`
/// result silently eliminates the candidate.
pub trait SignatureVerifier: Send + Sync {
    /// `issuer_public_key` is the issuer's DER-encoded SubjectPublicKeyInfo.
    fn verify(&self, certificate: &Certificate, issuer_public_key: &[u8]) -> bool;
}

/// Default verifier backed by `x509-parser`'s `verify` feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct X509SignatureVerifier;

impl SignatureVerifier for X509SignatureVerifier {
    fn verify(&self, certificate: &Certificate, issuer_public_key: &[u8]) -> bool {
        let Ok((_, x509)) = X509Certificate::from_der(certificate.der()) else {
            return false;
        };
        let Ok((_, spki)) = SubjectPublicKeyInfo::from_der(issuer_public_key) else {
            return false;
        };
        x509.verify_signature(Some(&spki)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CertBuilder;

    #[test]
    fn accepts_real_issuer_and_rejects_impostor() {
        let root = CertBuilder::new("Sig Root").ca().self_signed();
        let impostor = CertBuilder::new("Sig Root").ca().self_signed();
        let leaf = CertBuilder::new("Sig Leaf").signed_by(&root);

        let verifier = X509SignatureVerifier;
        assert!(verifier.verify(&leaf.cert, root.cert.public_key()));
        assert!(!verifier.verify(&leaf.cert, impostor.cert.public_key()));
        assert!(!verifier.verify(&leaf.cert, b"not a key"));
    }
}
