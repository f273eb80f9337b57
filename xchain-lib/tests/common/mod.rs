//! Shared fixtures for integration tests: a small CA hierarchy issued with
//! `rcgen` and parsed back through `xchain_lib`.

#![allow(dead_code)]

use rcgen::{
    BasicConstraints, CertificateParams, CustomExtension, DnType, GeneralSubtree, IsCa, KeyPair,
    NameConstraints, SerialNumber,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use xchain_lib::{Certificate, CertificateStore};

/// Reference time for all fixtures (2023-11-14T22:13:20Z).
pub const T0: i64 = 1_700_000_000;
pub const YEAR: i64 = 365 * 86_400;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1000);

pub struct Issued {
    pub cert: Certificate,
    rcgen: rcgen::Certificate,
    key: Arc<KeyPair>,
}

impl Issued {
    pub fn key(&self) -> Arc<KeyPair> {
        Arc::clone(&self.key)
    }
}

pub struct Fixture {
    params: CertificateParams,
    key: Option<Arc<KeyPair>>,
}

/// An end-entity named `cn`, valid for a year either side of [`T0`].
pub fn cert(cn: &str) -> Fixture {
    let mut params = CertificateParams::default();
    let mut dn = rcgen::DistinguishedName::new();
    dn.push(DnType::CommonName, cn);
    params.distinguished_name = dn;
    let serial = NEXT_SERIAL.fetch_add(1, Ordering::Relaxed);
    params.serial_number = Some(SerialNumber::from(serial));
    Fixture { params, key: None }.valid(T0 - YEAR, T0 + YEAR)
}

/// A CA named `cn` without a path length constraint.
pub fn ca(cn: &str) -> Fixture {
    cert(cn).is_ca(IsCa::Ca(BasicConstraints::Unconstrained))
}

impl Fixture {
    pub fn is_ca(mut self, is_ca: IsCa) -> Self {
        self.params.is_ca = is_ca;
        self
    }

    pub fn path_len(self, n: u8) -> Self {
        self.is_ca(IsCa::Ca(BasicConstraints::Constrained(n)))
    }

    pub fn not_ca(self) -> Self {
        self.is_ca(IsCa::ExplicitNoCa)
    }

    /// Replace BasicConstraints with a critical extension carrying `value`.
    pub fn raw_basic_constraints(mut self, value: Vec<u8>) -> Self {
        self.params.is_ca = IsCa::NoCa;
        let mut ext = CustomExtension::from_oid_content(&[2, 5, 29, 19], value);
        ext.set_criticality(true);
        self.params.custom_extensions.push(ext);
        self
    }

    /// Critical NameConstraints permitting only `domain`.
    pub fn permitted_dns(mut self, domain: &str) -> Self {
        self.params.name_constraints = Some(NameConstraints {
            permitted_subtrees: vec![GeneralSubtree::DnsName(domain.to_string())],
            excluded_subtrees: Vec::new(),
        });
        self
    }

    pub fn valid(mut self, not_before: i64, not_after: i64) -> Self {
        self.params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before).unwrap();
        self.params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after).unwrap();
        self
    }

    pub fn with_key(mut self, key: Arc<KeyPair>) -> Self {
        self.key = Some(key);
        self
    }

    fn key_pair(&mut self) -> Arc<KeyPair> {
        self.key
            .take()
            .unwrap_or_else(|| Arc::new(KeyPair::generate().unwrap()))
    }

    pub fn self_signed(mut self) -> Issued {
        let key = self.key_pair();
        let rcgen = self.params.self_signed(&*key).unwrap();
        parsed(rcgen, key)
    }

    pub fn issued_by(mut self, issuer: &Issued) -> Issued {
        let key = self.key_pair();
        let rcgen = self
            .params
            .signed_by(&*key, &issuer.rcgen, &*issuer.key)
            .unwrap();
        parsed(rcgen, key)
    }
}

fn parsed(rcgen: rcgen::Certificate, key: Arc<KeyPair>) -> Issued {
    let cert = xchain_lib::parse_der(rcgen.der()).unwrap();
    Issued { cert, rcgen, key }
}

pub fn store(certs: &[&Issued]) -> CertificateStore {
    certs.iter().map(|i| i.cert.clone()).collect()
}

/// Subject one-line names along a chain, leaf first.
pub fn names(certs: &[Certificate]) -> Vec<String> {
    certs.iter().map(|c| c.short_name()).collect()
}
