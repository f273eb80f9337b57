//! Certificate fingerprint (digest) computation.

use crate::util;
use digest::Digest;

/// Compute the SHA-256 fingerprint of DER-encoded certificate bytes.
///
/// The fingerprint is the certificate's identity inside a chain: two entries
/// with the same fingerprint are treated as the same certificate.
pub fn compute_fingerprint(der_bytes: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(der_bytes).into()
}

/// Colon-separated uppercase hex form of a fingerprint (e.g., "AB:CD:EF:...").
pub fn fingerprint_hex(fingerprint: &[u8; 32]) -> String {
    util::hex_colon_upper(fingerprint)
}
