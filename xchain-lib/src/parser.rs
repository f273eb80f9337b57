//! Certificate parsing from PEM and DER formats.
//!
//! ASN.1 decoding is delegated to `x509-parser`. Extension values that the
//! verifier interprets (BasicConstraints, KeyUsage) are decoded here; a
//! decode failure is recorded on the certificate instead of failing the
//! whole parse.

use crate::fields::{
    BasicConstraints, Certificate, DistinguishedName, Extension, ExtensionDecodeError, KeyUsage,
};
use crate::fingerprint::compute_fingerprint;
use crate::oid;
use crate::util;
use crate::XchainError;
use x509_parser::der_parser::ber::Tag;
use x509_parser::der_parser::der::parse_der_sequence;
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

/// Parse a certificate from PEM or DER (auto-detected).
///
/// If the input begins with `-----BEGIN` (after stripping whitespace), it is
/// treated as PEM. Otherwise it is treated as DER.
pub fn parse_cert(input: &[u8]) -> Result<Certificate, XchainError> {
    if input.is_empty() {
        return Err(XchainError::ParseError("empty input".into()));
    }

    if util::is_pem(input) {
        parse_pem(input)
    } else {
        parse_der(input)
    }
}

/// Parse a certificate from PEM format.
pub fn parse_pem(input: &[u8]) -> Result<Certificate, XchainError> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(input)
        .map_err(|e| XchainError::PemError(format!("{}", e)))?;

    if pem.label != "CERTIFICATE"
        && pem.label != "TRUSTED CERTIFICATE"
        && pem.label != "X509 CERTIFICATE"
    {
        return Err(XchainError::PemError(format!(
            "expected CERTIFICATE, got {}",
            pem.label
        )));
    }

    parse_der(&pem.contents)
}

/// Parse a certificate from DER format.
pub fn parse_der(input: &[u8]) -> Result<Certificate, XchainError> {
    let (remaining, x509) =
        X509Certificate::from_der(input).map_err(|e| XchainError::DerError(format!("{}", e)))?;

    // Use only the actual certificate bytes, not any trailing data,
    // so that the fingerprint (and therefore identity) covers the certificate.
    let cert_len = input.len() - remaining.len();
    let cert_der = input.get(..cert_len).unwrap_or(input);
    Ok(build_certificate(&x509, cert_der))
}

/// Parse a PEM-encoded file containing one or more certificates into
/// individual DER-encoded certificates.
pub fn parse_pem_chain(input: &[u8]) -> Result<Vec<Vec<u8>>, XchainError> {
    let mut certs = Vec::new();

    for pem_result in Pem::iter_from_buffer(input) {
        match pem_result {
            Ok(pem) => {
                if pem.label == "CERTIFICATE" || pem.label == "TRUSTED CERTIFICATE" {
                    certs.push(pem.contents);
                }
            }
            Err(e) => {
                // If we already have some certs, stop at first error (trailing garbage)
                if !certs.is_empty() {
                    break;
                }
                return Err(XchainError::PemError(format!("failed to parse PEM: {}", e)));
            }
        }
    }

    if certs.is_empty() {
        return Err(XchainError::PemError(
            "no certificates found in PEM input".into(),
        ));
    }

    Ok(certs)
}

pub(crate) fn build_dn(name: &X509Name) -> DistinguishedName {
    let mut components = Vec::new();
    for rdn in name.iter() {
        for attr in rdn.iter() {
            let key = util::oid_short_name(&attr.attr_type().to_id_string());
            let value = attr.as_str().unwrap_or("<binary>").to_string();
            components.push((key, value));
        }
    }
    DistinguishedName::new(name.as_raw().to_vec(), components)
}

fn build_certificate(x509: &X509Certificate, der: &[u8]) -> Certificate {
    let mut extensions = Vec::new();
    let mut basic_constraints = None;
    let mut key_usage = None;

    for ext in x509.extensions() {
        let oid_str = ext.oid.to_id_string();
        match oid_str.as_str() {
            // RFC 5280 Section 4.2: only the first instance counts.
            oid::EXT_BASIC_CONSTRAINTS if basic_constraints.is_none() => {
                basic_constraints =
                    Some(decode_basic_constraints(ext.value, ext.parsed_extension()));
            }
            oid::EXT_KEY_USAGE if key_usage.is_none() => {
                key_usage = Some(decode_key_usage(ext.parsed_extension()));
            }
            _ => {}
        }
        extensions.push(Extension {
            oid: oid_str,
            critical: ext.critical,
            value: ext.value.to_vec(),
        });
    }

    Certificate {
        der: der.to_vec(),
        fingerprint: compute_fingerprint(der),
        version: x509.version().0,
        serial: x509.raw_serial().to_vec(),
        subject: build_dn(x509.subject()),
        issuer: build_dn(x509.issuer()),
        not_before: x509.validity().not_before.timestamp(),
        not_after: x509.validity().not_after.timestamp(),
        public_key: x509.public_key().raw.to_vec(),
        signature_algorithm: x509.signature_algorithm.algorithm.to_id_string(),
        signature: x509.signature_value.data.to_vec(),
        extensions,
        basic_constraints,
        key_usage,
    }
}

fn decode_basic_constraints(
    value: &[u8],
    parsed: &ParsedExtension,
) -> Result<BasicConstraints, ExtensionDecodeError> {
    check_basic_constraints_shape(value).map_err(|details| ExtensionDecodeError {
        extension: "BasicConstraints",
        details,
    })?;
    match parsed {
        ParsedExtension::BasicConstraints(bc) => Ok(BasicConstraints {
            ca: bc.ca,
            path_len_constraint: bc.path_len_constraint,
        }),
        ParsedExtension::ParseError { error } => Err(ExtensionDecodeError {
            extension: "BasicConstraints",
            details: format!("{:?}", error),
        }),
        other => Err(ExtensionDecodeError {
            extension: "BasicConstraints",
            details: format!("unexpected extension content: {:?}", other),
        }),
    }
}

/// The extnValue must be exactly `SEQUENCE { BOOLEAN OPTIONAL, INTEGER
/// OPTIONAL }`. x509-parser tolerates trailing bytes and extra elements.
fn check_basic_constraints_shape(value: &[u8]) -> Result<(), String> {
    let (rest, seq) = parse_der_sequence(value).map_err(|e| format!("{:?}", e))?;
    if !rest.is_empty() {
        return Err(format!("{} trailing bytes after SEQUENCE", rest.len()));
    }
    let items = seq.as_sequence().map_err(|e| format!("{:?}", e))?;
    let mut items = items.iter().peekable();
    if items.peek().is_some_and(|o| o.header.tag() == Tag::Boolean) {
        items.next();
    }
    if items.peek().is_some_and(|o| o.header.tag() == Tag::Integer) {
        items.next();
    }
    match items.next() {
        Some(extra) => Err(format!("unexpected {:?} in SEQUENCE", extra.header.tag())),
        None => Ok(()),
    }
}

fn decode_key_usage(parsed: &ParsedExtension) -> Result<KeyUsage, ExtensionDecodeError> {
    match parsed {
        ParsedExtension::KeyUsage(ku) => Ok(KeyUsage { flags: ku.flags }),
        ParsedExtension::ParseError { error } => Err(ExtensionDecodeError {
            extension: "KeyUsage",
            details: format!("{:?}", error),
        }),
        other => Err(ExtensionDecodeError {
            extension: "KeyUsage",
            details: format!("unexpected extension content: {:?}", other),
        }),
    }
}
