//! PEM <-> DER format conversion.

use crate::util;
use crate::XchainError;

/// Convert DER-encoded certificate bytes to a PEM string.
pub fn der_to_pem(der: &[u8]) -> String {
    format!(
        "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
        util::base64_wrap(der)
    )
}

/// Convert a PEM-encoded certificate to DER bytes.
///
/// Only the first PEM block is decoded.
pub fn pem_to_der(pem: &[u8]) -> Result<Vec<u8>, XchainError> {
    let (_, block) = x509_parser::pem::parse_x509_pem(pem)
        .map_err(|e| XchainError::PemError(format!("{}", e)))?;
    Ok(block.contents)
}
