//! Certificate value types shared by the parser and the verifier.

use crate::util;
use serde::Serialize;
use std::hash::{Hash, Hasher};

/// Distinguished name with ordered components.
///
/// Equality and hashing use only the raw DER encoding of the `Name`, which
/// is what subject/issuer chaining compares. `components` exists for display.
#[derive(Debug, Clone, Serialize)]
pub struct DistinguishedName {
    /// Raw DER encoding of the name.
    #[serde(skip)]
    raw: Vec<u8>,
    /// Ordered list of (attribute_type, value) pairs.
    /// Attribute types use short names where known (e.g., "CN", "O", "C").
    pub components: Vec<(String, String)>,
}

impl DistinguishedName {
    /// Build a name from its raw DER encoding and decoded components.
    pub fn new(raw: Vec<u8>, components: Vec<(String, String)>) -> Self {
        DistinguishedName { raw, components }
    }

    /// Raw DER encoding of the name.
    pub fn as_raw(&self) -> &[u8] {
        &self.raw
    }

    /// Value of the first attribute with the given short name (e.g. "CN").
    pub fn attribute(&self, short_name: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|(k, _)| k == short_name)
            .map(|(_, v)| v.as_str())
    }

    /// Format as a comma-separated one-line string matching OpenSSL's default format.
    /// Example: "C = US, O = Org, CN = example.com"
    ///
    /// Values containing commas, equals signs, or backslashes are escaped
    /// to prevent ambiguous output.
    pub fn to_oneline(&self) -> String {
        let mut result = String::new();
        for (i, (k, v)) in self.components.iter().enumerate() {
            if i > 0 {
                result.push_str(", ");
            }
            result.push_str(k);
            result.push_str(" = ");
            for ch in v.chars() {
                match ch {
                    '\\' => result.push_str("\\\\"),
                    ',' => result.push_str("\\,"),
                    '=' => result.push_str("\\="),
                    _ => result.push(ch),
                }
            }
        }
        result
    }
}

impl PartialEq for DistinguishedName {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for DistinguishedName {}

impl Hash for DistinguishedName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_oneline())
    }
}

/// A single X.509v3 extension: OID, criticality and raw `extnValue` bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extension {
    /// Dotted-decimal OID.
    pub oid: String,
    /// Whether the extension is marked critical.
    pub critical: bool,
    /// Contents of the `extnValue` OCTET STRING.
    #[serde(skip)]
    pub value: Vec<u8>,
}

/// Decoded BasicConstraints extension (RFC 5280 Section 4.2.1.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasicConstraints {
    /// The `cA` flag (DEFAULT FALSE).
    pub ca: bool,
    /// Maximum number of non-self-issued intermediates that may follow.
    pub path_len_constraint: Option<u32>,
}

/// Decoded KeyUsage extension (RFC 5280 Section 4.2.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyUsage {
    /// Bit flags, bit 0 = digitalSignature.
    pub flags: u16,
}

impl KeyUsage {
    pub fn digital_signature(&self) -> bool {
        self.flags & 1 != 0
    }

    pub fn key_cert_sign(&self) -> bool {
        self.flags & (1 << 5) != 0
    }

    pub fn crl_sign(&self) -> bool {
        self.flags & (1 << 6) != 0
    }
}

/// An extension whose value bytes did not decode to the expected structure.
///
/// Kept on the certificate rather than failing the parse, so that policies
/// can tell a corrupt extension apart from one that decodes to a restriction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to decode {extension} extension: {details}")]
pub struct ExtensionDecodeError {
    /// Human-readable extension name.
    pub extension: &'static str,
    /// Decoder error text.
    pub details: String,
}

/// A parsed X.509 certificate.
///
/// Immutable once built by [`crate::parse_der`]. Two certificates are equal
/// when their DER encodings are identical.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub(crate) der: Vec<u8>,
    pub(crate) fingerprint: [u8; 32],
    pub(crate) version: u32,
    pub(crate) serial: Vec<u8>,
    pub(crate) subject: DistinguishedName,
    pub(crate) issuer: DistinguishedName,
    pub(crate) not_before: i64,
    pub(crate) not_after: i64,
    pub(crate) public_key: Vec<u8>,
    pub(crate) signature_algorithm: String,
    pub(crate) signature: Vec<u8>,
    pub(crate) extensions: Vec<Extension>,
    pub(crate) basic_constraints: Option<Result<BasicConstraints, ExtensionDecodeError>>,
    pub(crate) key_usage: Option<Result<KeyUsage, ExtensionDecodeError>>,
}

impl Certificate {
    /// DER encoding of the certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// SHA-256 digest of the DER encoding.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    /// X.509 version number as encoded (0 = v1, 2 = v3).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Raw serial number bytes.
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Serial number as colon-separated hex.
    pub fn serial_hex(&self) -> String {
        util::hex_colon_upper(&self.serial)
    }

    pub fn subject(&self) -> &DistinguishedName {
        &self.subject
    }

    pub fn issuer(&self) -> &DistinguishedName {
        &self.issuer
    }

    /// Start of the validity window, in Unix seconds.
    pub fn not_before(&self) -> i64 {
        self.not_before
    }

    /// End of the validity window, in Unix seconds.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    /// DER-encoded SubjectPublicKeyInfo.
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Dotted OID of the outer signature algorithm.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// First extension with the given dotted OID.
    pub fn extension(&self, oid_str: &str) -> Option<&Extension> {
        self.extensions.iter().find(|e| e.oid == oid_str)
    }

    /// BasicConstraints: `None` when absent, `Some(Err(_))` when the value
    /// bytes do not decode.
    pub fn basic_constraints(&self) -> Option<&Result<BasicConstraints, ExtensionDecodeError>> {
        self.basic_constraints.as_ref()
    }

    /// KeyUsage: `None` when absent, `Some(Err(_))` when the value bytes do
    /// not decode.
    pub fn key_usage(&self) -> Option<&Result<KeyUsage, ExtensionDecodeError>> {
        self.key_usage.as_ref()
    }

    /// RFC 5280 Section 6.1: a certificate is self-issued when subject and
    /// issuer are the same name.
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Short human-readable identifier: CN, then O, then OU, else "Unknown".
    pub fn short_name(&self) -> String {
        ["CN", "O", "OU"]
            .iter()
            .find_map(|k| self.subject.attribute(k))
            .unwrap_or("Unknown")
            .to_string()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.fingerprint == other.fingerprint && self.der == other.der
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fingerprint.hash(state);
    }
}

impl std::fmt::Display for Certificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.subject, self.serial_hex())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dn(raw: &[u8], cn: &str) -> DistinguishedName {
        DistinguishedName::new(raw.to_vec(), vec![("CN".into(), cn.into())])
    }

    #[test]
    fn names_compare_by_raw_encoding() {
        assert_eq!(dn(&[1, 2, 3], "a"), dn(&[1, 2, 3], "b"));
        assert_ne!(dn(&[1, 2, 3], "a"), dn(&[1, 2, 4], "a"));
    }

    #[test]
    fn oneline_escapes_separators() {
        let name = DistinguishedName::new(
            vec![],
            vec![
                ("O".into(), "Acme, Inc.".into()),
                ("CN".into(), "a=b\\c".into()),
            ],
        );
        assert_eq!(name.to_oneline(), "O = Acme\\, Inc., CN = a\\=b\\\\c");
    }

    #[test]
    fn key_usage_bits() {
        let ku = KeyUsage { flags: 1 << 5 };
        assert!(ku.key_cert_sign());
        assert!(!ku.digital_signature());
        assert!(!ku.crl_sign());
    }
}
