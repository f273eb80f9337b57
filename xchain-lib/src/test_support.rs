//! Certificate fixtures for unit tests, issued with `rcgen`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::Certificate;
use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DnType, IsCa, KeyPair, KeyUsagePurpose,
    SerialNumber,
};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed reference time for fixtures (2023-11-14T22:13:20Z).
pub(crate) const T0: i64 = 1_700_000_000;

const YEAR: i64 = 365 * 86_400;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// An issued fixture: the parsed certificate plus what is needed to sign
/// further certificates with it.
pub(crate) struct Issued {
    pub cert: Certificate,
    pub rcgen: rcgen::Certificate,
    pub key: KeyPair,
}

pub(crate) struct CertBuilder {
    params: CertificateParams,
}

impl CertBuilder {
    /// A non-CA certificate named `CN = cn`, valid for a year either side of [`T0`].
    pub fn new(cn: &str) -> Self {
        let mut params = CertificateParams::default();
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(DnType::CommonName, cn);
        params.distinguished_name = dn;
        let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
        params.serial_number = Some(SerialNumber::from(serial));
        let builder = CertBuilder { params };
        builder.validity(T0 - YEAR, T0 + YEAR)
    }

    pub fn ca(mut self) -> Self {
        self.params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        self
    }

    pub fn path_len(mut self, n: u8) -> Self {
        self.params.is_ca = IsCa::Ca(BasicConstraints::Constrained(n));
        self
    }

    /// BasicConstraints present with `cA = FALSE`.
    pub fn explicit_not_ca(mut self) -> Self {
        self.params.is_ca = IsCa::ExplicitNoCa;
        self
    }

    /// Critical BasicConstraints extension with arbitrary value bytes.
    pub fn raw_basic_constraints(mut self, value: Vec<u8>) -> Self {
        self.params.is_ca = IsCa::NoCa;
        let mut ext = CustomExtension::from_oid_content(&[2, 5, 29, 19], value);
        ext.set_criticality(true);
        self.params.custom_extensions.push(ext);
        self
    }

    pub fn critical_extension(mut self, oid: &[u64]) -> Self {
        let mut ext = CustomExtension::from_oid_content(oid, vec![0x05, 0x00]);
        ext.set_criticality(true);
        self.params.custom_extensions.push(ext);
        self
    }

    pub fn key_usage_cert_sign(mut self) -> Self {
        self.params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
        self
    }

    pub fn key_usage_digital_signature_only(mut self) -> Self {
        self.params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        self
    }

    pub fn validity(mut self, not_before: i64, not_after: i64) -> Self {
        self.params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before).unwrap();
        self.params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after).unwrap();
        self
    }

    pub fn self_signed(self) -> Issued {
        let key = KeyPair::generate().unwrap();
        let rcgen = self.params.self_signed(&key).unwrap();
        finish(rcgen, key)
    }

    pub fn signed_by(self, issuer: &Issued) -> Issued {
        let key = KeyPair::generate().unwrap();
        let rcgen = self
            .params
            .signed_by(&key, &issuer.rcgen, &issuer.key)
            .unwrap();
        finish(rcgen, key)
    }
}

fn finish(rcgen: rcgen::Certificate, key: KeyPair) -> Issued {
    let cert = crate::parse_der(rcgen.der()).unwrap();
    Issued { cert, rcgen, key }
}
