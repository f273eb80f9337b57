//! Standard RFC 5280 policies.
//!
//! Each policy is a thin [`VerifierPolicy`] wrapper around a synchronous
//! check function over a complete chain (leaf at depth 0). Checks stop at
//! the first violation, walking from the leaf towards the anchor.

use super::helpers::{ca_depths, count_non_self_issued, is_known_extension};
use super::policy::{PolicyOutcome, PolicySet, PolicyViolation, VerifierPolicy};
use super::Chain;
use crate::fields::Certificate;
use async_trait::async_trait;

fn subject_of(cert: &Certificate) -> String {
    cert.subject().to_oneline()
}

fn outcome(result: Result<(), PolicyViolation>) -> PolicyOutcome {
    match result {
        Ok(()) => PolicyOutcome::MeetsPolicy,
        Err(v) => PolicyOutcome::FailsToMeetPolicy(v),
    }
}

/// Validity dates for every certificate, anchor included.
pub(crate) fn check_time_validity(chain: &Chain, at: i64) -> Result<(), PolicyViolation> {
    for (depth, cert) in chain.iter().enumerate() {
        let subject = || subject_of(cert);
        if cert.not_before() > cert.not_after() {
            return Err(PolicyViolation::InvalidValidityWindow {
                depth,
                subject: subject(),
            });
        }
        if at < cert.not_before() {
            return Err(PolicyViolation::NotYetValid {
                depth,
                subject: subject(),
            });
        }
        if at > cert.not_after() {
            return Err(PolicyViolation::Expired {
                depth,
                subject: subject(),
            });
        }
    }
    Ok(())
}

/// BasicConstraints for every certificate acting as a CA.
pub(crate) fn check_basic_constraints(chain: &Chain) -> Result<(), PolicyViolation> {
    let certs = chain.certificates();
    for depth in ca_depths(certs.len()) {
        let Some(cert) = certs.get(depth) else {
            break;
        };
        let constraints = match cert.basic_constraints() {
            None => {
                return Err(PolicyViolation::MissingBasicConstraints {
                    depth,
                    subject: subject_of(cert),
                })
            }
            Some(Err(e)) => {
                return Err(PolicyViolation::MalformedBasicConstraints {
                    depth,
                    subject: subject_of(cert),
                    details: e.details.clone(),
                })
            }
            Some(Ok(bc)) => *bc,
        };
        if !constraints.ca {
            return Err(PolicyViolation::NotCertificateAuthority {
                depth,
                subject: subject_of(cert),
            });
        }
        if let Some(path_len) = constraints.path_len_constraint {
            // Intermediates strictly between the leaf and this CA.
            let below = certs.get(1..depth).unwrap_or(&[]);
            let intermediates_below = count_non_self_issued(below);
            if intermediates_below > path_len {
                return Err(PolicyViolation::PathLengthExceeded {
                    depth,
                    subject: subject_of(cert),
                    path_len,
                    intermediates_below,
                });
            }
        }
    }
    Ok(())
}

/// RFC 5280 Section 4.2.1.3: CA certificates with Key Usage must assert
/// keyCertSign.
pub(crate) fn check_key_cert_sign(chain: &Chain) -> Result<(), PolicyViolation> {
    let certs = chain.certificates();
    for depth in ca_depths(certs.len()) {
        let Some(cert) = certs.get(depth) else {
            break;
        };
        match cert.key_usage() {
            None => {}
            Some(Err(e)) => {
                return Err(PolicyViolation::MalformedKeyUsage {
                    depth,
                    subject: subject_of(cert),
                    details: e.details.clone(),
                })
            }
            Some(Ok(ku)) if !ku.key_cert_sign() => {
                return Err(PolicyViolation::MissingKeyCertSign {
                    depth,
                    subject: subject_of(cert),
                })
            }
            Some(Ok(_)) => {}
        }
    }
    Ok(())
}

/// RFC 5280 Section 4.2: reject certificates with unknown critical extensions.
pub(crate) fn check_critical_extensions(chain: &Chain) -> Result<(), PolicyViolation> {
    for (depth, cert) in chain.iter().enumerate() {
        if let Some(ext) = cert
            .extensions()
            .iter()
            .find(|ext| ext.critical && !is_known_extension(&ext.oid))
        {
            return Err(PolicyViolation::UnrecognizedCriticalExtension {
                depth,
                subject: subject_of(cert),
                oid: ext.oid.clone(),
            });
        }
    }
    Ok(())
}

/// Every certificate must be within its validity window at a fixed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    at: i64,
}

impl ExpiryPolicy {
    /// Validate at `at`, in Unix seconds.
    pub fn new(at: i64) -> Self {
        ExpiryPolicy { at }
    }

    /// Validate at the current wall-clock time.
    pub fn now() -> Self {
        Self::new(time::OffsetDateTime::now_utc().unix_timestamp())
    }

    pub fn validation_time(&self) -> i64 {
        self.at
    }
}

#[async_trait]
impl VerifierPolicy for ExpiryPolicy {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        outcome(check_time_validity(chain, self.at))
    }
}

/// Every issuer must assert `cA` and respect its path length constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraintsPolicy;

#[async_trait]
impl VerifierPolicy for BasicConstraintsPolicy {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        outcome(check_basic_constraints(chain))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyUsagePolicy;

#[async_trait]
impl VerifierPolicy for KeyUsagePolicy {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        outcome(check_key_cert_sign(chain))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CriticalExtensionsPolicy;

#[async_trait]
impl VerifierPolicy for CriticalExtensionsPolicy {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        outcome(check_critical_extensions(chain))
    }
}

/// The RFC 5280 baseline: expiry, basic constraints, key usage and critical
/// extensions, evaluated in that order.
#[derive(Debug)]
pub struct Rfc5280Policy {
    inner: PolicySet,
}

impl Rfc5280Policy {
    pub fn new(at: i64) -> Self {
        let inner = PolicySet::new()
            .with(ExpiryPolicy::new(at))
            .with(BasicConstraintsPolicy)
            .with(KeyUsagePolicy)
            .with(CriticalExtensionsPolicy);
        Rfc5280Policy { inner }
    }

    pub fn now() -> Self {
        Self::new(time::OffsetDateTime::now_utc().unix_timestamp())
    }
}

#[async_trait]
impl VerifierPolicy for Rfc5280Policy {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        self.inner.chain_meets_policy(chain).await
    }
}
