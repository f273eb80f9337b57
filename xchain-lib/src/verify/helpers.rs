//! Small helper functions shared by the search and the standard policies.

use crate::fields::Certificate;
use crate::oid;

/// Check if an extension OID is one that this library recognizes.
///
/// RFC 5280 Section 4.2: a certificate-using system MUST reject a
/// certificate that carries an unrecognized critical extension. Name and
/// policy constraints are not enforced here, so they are not listed.
pub(crate) fn is_known_extension(oid: &str) -> bool {
    matches!(
        oid,
        // RFC 5280 standard extensions
        oid::EXT_SUBJECT_KEY_ID
        | oid::EXT_KEY_USAGE
        | oid::EXT_SUBJECT_ALT_NAME
        | oid::EXT_ISSUER_ALT_NAME
        | oid::EXT_BASIC_CONSTRAINTS
        | oid::EXT_CRL_DISTRIBUTION_POINTS
        | oid::EXT_CERTIFICATE_POLICIES
        | oid::EXT_AUTHORITY_KEY_ID
        | oid::EXT_EXTENDED_KEY_USAGE
        | oid::EXT_FRESHEST_CRL
        // Common extensions in practice
        | oid::EXT_AUTHORITY_INFO_ACCESS
        | oid::EXT_SUBJECT_INFO_ACCESS
        | oid::EXT_TLS_FEATURE
        | oid::EXT_SCT_LIST
        | oid::EXT_CT_POISON
        // Netscape extensions (legacy, but still seen)
        | oid::EXT_NETSCAPE_CERT_TYPE
    )
}

/// Depths of the certificates acting as a CA in a chain.
///
/// Every certificate except the leaf issues the one below it. A chain of
/// one certificate is a self-signed anchor, which is its own issuer.
pub(crate) fn ca_depths(len: usize) -> std::ops::Range<usize> {
    if len == 1 {
        0..1
    } else {
        1..len
    }
}

/// Number of non-self-issued certificates in `certs`.
///
/// RFC 5280 Section 6.1.4(h): self-issued intermediates do not count
/// toward pathLenConstraint.
pub(crate) fn count_non_self_issued<'a>(certs: impl IntoIterator<Item = &'a Certificate>) -> u32 {
    let n = certs.into_iter().filter(|c| !c.is_self_issued()).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}
