//! The policy evaluation protocol and its composition rule.

use super::Chain;
use async_trait::async_trait;
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Verdict of one policy over one complete chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    MeetsPolicy,
    FailsToMeetPolicy(PolicyViolation),
}

impl PolicyOutcome {
    pub fn is_met(&self) -> bool {
        matches!(self, PolicyOutcome::MeetsPolicy)
    }
}

/// Why a chain was rejected.
///
/// Depths count from the leaf (depth 0) towards the trust anchor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyViolation {
    #[error("certificate at depth {depth} ({subject}) is not yet valid")]
    NotYetValid { depth: usize, subject: String },

    #[error("certificate at depth {depth} ({subject}) has expired")]
    Expired { depth: usize, subject: String },

    #[error(
        "certificate at depth {depth} ({subject}) has an invalid validity window \
         (notBefore is after notAfter)"
    )]
    InvalidValidityWindow { depth: usize, subject: String },

    #[error(
        "certificate at depth {depth} ({subject}) is used as issuer but has no Basic Constraints"
    )]
    MissingBasicConstraints { depth: usize, subject: String },

    #[error("certificate at depth {depth} ({subject}) has malformed Basic Constraints: {details}")]
    MalformedBasicConstraints {
        depth: usize,
        subject: String,
        details: String,
    },

    #[error("certificate at depth {depth} ({subject}) is not a CA but is used as issuer")]
    NotCertificateAuthority { depth: usize, subject: String },

    #[error(
        "certificate at depth {depth} ({subject}) path length constraint violated \
         (pathlen={path_len}, intermediates below={intermediates_below})"
    )]
    PathLengthExceeded {
        depth: usize,
        subject: String,
        path_len: u32,
        intermediates_below: u32,
    },

    #[error(
        "certificate at depth {depth} ({subject}) is a CA but Key Usage does not include \
         keyCertSign"
    )]
    MissingKeyCertSign { depth: usize, subject: String },

    #[error("certificate at depth {depth} ({subject}) has malformed Key Usage: {details}")]
    MalformedKeyUsage {
        depth: usize,
        subject: String,
        details: String,
    },

    #[error("certificate at depth {depth} ({subject}) has unrecognized critical extension {oid}")]
    UnrecognizedCriticalExtension {
        depth: usize,
        subject: String,
        oid: String,
    },

    #[error("{reason}")]
    Custom { reason: String },
}

impl PolicyViolation {
    /// Shorthand for a caller-defined rejection.
    pub fn custom(reason: impl Into<String>) -> Self {
        PolicyViolation::Custom {
            reason: reason.into(),
        }
    }

    /// Depth of the offending certificate, when the violation names one.
    pub fn depth(&self) -> Option<usize> {
        match self {
            PolicyViolation::NotYetValid { depth, .. }
            | PolicyViolation::Expired { depth, .. }
            | PolicyViolation::InvalidValidityWindow { depth, .. }
            | PolicyViolation::MissingBasicConstraints { depth, .. }
            | PolicyViolation::MalformedBasicConstraints { depth, .. }
            | PolicyViolation::NotCertificateAuthority { depth, .. }
            | PolicyViolation::PathLengthExceeded { depth, .. }
            | PolicyViolation::MissingKeyCertSign { depth, .. }
            | PolicyViolation::MalformedKeyUsage { depth, .. }
            | PolicyViolation::UnrecognizedCriticalExtension { depth, .. } => Some(*depth),
            PolicyViolation::Custom { .. } => None,
        }
    }
}

/// One policy rejection of one complete candidate chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyFailure {
    pub chain: Chain,
    pub violation: PolicyViolation,
}

impl std::fmt::Display for PolicyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.violation)
    }
}

impl Serialize for PolicyFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PolicyFailure", 3)?;
        s.serialize_field("reason", &self.violation.to_string())?;
        s.serialize_field("violation", &self.violation)?;
        s.serialize_field("chain", &self.chain)?;
        s.end()
    }
}

/// A predicate over complete leaf-to-anchor chains.
///
/// Evaluation may suspend (a policy is free to perform I/O). The `&mut self`
/// receiver lets a policy keep per-session state between calls, and means a
/// single policy value cannot be evaluated concurrently.
#[async_trait]
pub trait VerifierPolicy: Send {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome;
}

#[async_trait]
impl<P: VerifierPolicy + ?Sized> VerifierPolicy for Box<P> {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        (**self).chain_meets_policy(chain).await
    }
}

/// An ordered conjunction of policies.
///
/// Members are evaluated in order over the same chain; the first failure is
/// returned without consulting the rest. An empty set accepts every chain.
#[derive(Default)]
pub struct PolicySet {
    policies: Vec<Box<dyn VerifierPolicy>>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a policy, evaluated after those already present.
    pub fn push<P: VerifierPolicy + 'static>(&mut self, policy: P) {
        self.policies.push(Box::new(policy));
    }

    /// Builder form of [`PolicySet::push`].
    pub fn with<P: VerifierPolicy + 'static>(mut self, policy: P) -> Self {
        self.push(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl From<Vec<Box<dyn VerifierPolicy>>> for PolicySet {
    fn from(policies: Vec<Box<dyn VerifierPolicy>>) -> Self {
        PolicySet { policies }
    }
}

impl std::fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicySet")
            .field("len", &self.policies.len())
            .finish()
    }
}

#[async_trait]
impl VerifierPolicy for PolicySet {
    async fn chain_meets_policy(&mut self, chain: &Chain) -> PolicyOutcome {
        for policy in self.policies.iter_mut() {
            let outcome = policy.chain_meets_policy(chain).await;
            if !outcome.is_met() {
                return outcome;
            }
        }
        PolicyOutcome::MeetsPolicy
    }
}
