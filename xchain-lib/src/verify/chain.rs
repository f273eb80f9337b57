//! Certificate chain building via depth-first search with backtracking.
//!
//! Given a leaf certificate and a pool of untrusted intermediates, the
//! [`Verifier`] walks issuer links towards the trust anchors in its root
//! store. Every time a path reaches a root, the complete chain is handed to
//! the policy; the first chain the policy accepts wins. Policy rejections are
//! remembered and the search backtracks to try the next candidate.

use super::helpers::count_non_self_issued;
use super::policy::{PolicyFailure, PolicyOutcome, VerifierPolicy};
use super::signature::{SignatureVerifier, X509SignatureVerifier};
use super::{CertificateStore, Chain, VerificationResult};
use crate::fields::Certificate;
use crate::XchainError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default upper bound on chain length, leaf and anchor included.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Default number of issuer signature checks one validation may perform.
///
/// Path length alone does not bound the search: a pool of interchangeable
/// self-issued CAs admits factorially many simple paths.
pub const MAX_SIGNATURE_CHECKS: usize = 100;

/// Issuer candidates for one certificate on the current path.
struct Frame<'a> {
    /// (candidate, is trust anchor), roots first.
    candidates: Vec<(&'a Certificate, bool)>,
    next: usize,
}

impl<'a> Frame<'a> {
    fn next_candidate(&mut self) -> Option<(&'a Certificate, bool)> {
        let candidate = self.candidates.get(self.next).copied();
        self.next += 1;
        candidate
    }
}

/// Chain builder and policy evaluator.
///
/// A verifier owns its trust anchors and policy. `validate` takes `&mut self`
/// because policies may carry per-session state; use one verifier per
/// concurrent validation (the root store is shared through an [`Arc`]).
pub struct Verifier<P> {
    roots: Arc<CertificateStore>,
    policy: P,
    signatures: Arc<dyn SignatureVerifier>,
    max_chain_length: usize,
    max_signature_checks: usize,
}

impl<P> std::fmt::Debug for Verifier<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier")
            .field("roots", &self.roots)
            .field("max_chain_length", &self.max_chain_length)
            .field("max_signature_checks", &self.max_signature_checks)
            .finish()
    }
}

impl<P: VerifierPolicy> Verifier<P> {
    pub fn new(roots: impl Into<Arc<CertificateStore>>, policy: P) -> Self {
        Verifier {
            roots: roots.into(),
            policy,
            signatures: Arc::new(X509SignatureVerifier),
            max_chain_length: MAX_CHAIN_DEPTH,
            max_signature_checks: MAX_SIGNATURE_CHECKS,
        }
    }

    /// Replace the signature verifier used to test issuer candidates.
    pub fn with_signature_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.signatures = verifier;
        self
    }

    /// Longest chain (leaf and anchor included) the search will build.
    /// Values below 1 are raised to 1.
    pub fn with_max_chain_length(mut self, max: usize) -> Self {
        self.max_chain_length = max.max(1);
        self
    }

    /// Signature checks allowed per validation. Once spent, the search stops
    /// and reports the policy failures recorded so far.
    pub fn with_max_signature_checks(mut self, max: usize) -> Self {
        self.max_signature_checks = max;
        self
    }

    pub fn roots(&self) -> &CertificateStore {
        &self.roots
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    pub fn max_chain_length(&self) -> usize {
        self.max_chain_length
    }

    pub fn max_signature_checks(&self) -> usize {
        self.max_signature_checks
    }

    /// Find a chain from `leaf` to a trust anchor that meets the policy.
    pub async fn validate(
        &mut self,
        leaf: &Certificate,
        intermediates: &CertificateStore,
    ) -> VerificationResult {
        let token = CancellationToken::new();
        match self
            .validate_with_cancellation(leaf, intermediates, &token)
            .await
        {
            Ok(result) => result,
            // Nothing else holds this token, so it is never cancelled.
            Err(_) => VerificationResult::CouldNotValidate(Vec::new()),
        }
    }

    /// Like [`Verifier::validate`], but returns [`XchainError::Cancelled`]
    /// as soon as `cancel` fires, including while a policy evaluation is
    /// suspended.
    pub async fn validate_with_cancellation(
        &mut self,
        leaf: &Certificate,
        intermediates: &CertificateStore,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, XchainError> {
        if cancel.is_cancelled() {
            return Err(XchainError::Cancelled);
        }

        let roots = Arc::clone(&self.roots);
        let result = self.search(leaf, &roots, intermediates, cancel).await?;
        match &result {
            VerificationResult::ValidCertificate(chain) => {
                debug!(leaf = %leaf.subject(), length = chain.len(), "chain meets policy");
            }
            VerificationResult::CouldNotValidate(failures) => {
                debug!(leaf = %leaf.subject(), failures = failures.len(), "could not validate");
            }
        }
        Ok(result)
    }

    async fn search<'a>(
        &mut self,
        leaf: &'a Certificate,
        roots: &'a CertificateStore,
        intermediates: &'a CertificateStore,
        cancel: &CancellationToken,
    ) -> Result<VerificationResult, XchainError> {
        let mut failures = Vec::new();
        let mut budget = self.max_signature_checks;

        // A leaf that is itself a trust anchor forms a chain of one.
        if roots.contains(leaf) {
            let chain = Chain::new(vec![leaf.clone()]);
            match evaluate(&mut self.policy, chain, cancel).await? {
                Ok(chain) => return Ok(VerificationResult::ValidCertificate(chain)),
                Err(failure) => failures.push(failure),
            }
        }

        let mut path: Vec<&'a Certificate> = vec![leaf];
        let mut frames = vec![Frame {
            candidates: issuer_candidates(leaf, roots, intermediates),
            next: 0,
        }];

        while let Some(frame) = frames.last_mut() {
            if cancel.is_cancelled() {
                return Err(XchainError::Cancelled);
            }

            let Some((candidate, is_root)) = frame.next_candidate() else {
                frames.pop();
                if let Some(done) = path.pop() {
                    debug!(subject = %done.subject(), "backtracking");
                }
                continue;
            };
            let Some(&tail) = path.last() else {
                break;
            };

            if path.contains(&candidate) {
                trace!(subject = %candidate.subject(), "candidate already on path");
                continue;
            }
            let Some(left) = budget.checked_sub(1) else {
                debug!(
                    leaf = %leaf.subject(),
                    checks = self.max_signature_checks,
                    "signature check budget exhausted"
                );
                break;
            };
            budget = left;
            if !self.signatures.verify(tail, candidate.public_key()) {
                trace!(
                    subject = %candidate.subject(),
                    serial = %candidate.serial_hex(),
                    "candidate did not sign the certificate"
                );
                continue;
            }

            if is_root {
                if path.len() + 1 > self.max_chain_length {
                    trace!(subject = %candidate.subject(), "root beyond maximum chain length");
                    continue;
                }
                let certs = path
                    .iter()
                    .copied()
                    .chain(std::iter::once(candidate))
                    .cloned()
                    .collect();
                match evaluate(&mut self.policy, Chain::new(certs), cancel).await? {
                    Ok(chain) => return Ok(VerificationResult::ValidCertificate(chain)),
                    Err(failure) => failures.push(failure),
                }
                continue;
            }

            // An intermediate still needs an anchor above it.
            if path.len() + 2 > self.max_chain_length {
                trace!(subject = %candidate.subject(), "intermediate beyond maximum chain length");
                continue;
            }
            if let Some(Ok(bc)) = candidate.basic_constraints() {
                if let Some(path_len) = bc.path_len_constraint {
                    let below = count_non_self_issued(path.iter().skip(1).copied());
                    if below > path_len {
                        trace!(
                            subject = %candidate.subject(),
                            path_len,
                            below,
                            "intermediate path length too short"
                        );
                        continue;
                    }
                }
            }

            debug!(depth = path.len(), subject = %candidate.subject(), "descending");
            path.push(candidate);
            frames.push(Frame {
                candidates: issuer_candidates(candidate, roots, intermediates),
                next: 0,
            });
        }

        Ok(VerificationResult::CouldNotValidate(failures))
    }
}

/// Possible issuers of `cert`: trust anchors first, then intermediates that
/// are not also anchors, insertion order within each store.
fn issuer_candidates<'a>(
    cert: &Certificate,
    roots: &'a CertificateStore,
    intermediates: &'a CertificateStore,
) -> Vec<(&'a Certificate, bool)> {
    let issuer = cert.issuer();
    roots
        .certificates(issuer)
        .iter()
        .map(|c| (c, true))
        .chain(
            intermediates
                .certificates(issuer)
                .iter()
                .filter(|c| !roots.contains(c))
                .map(|c| (c, false)),
        )
        .collect()
}

/// Run the policy over a complete chain, giving up if `cancel` fires first.
async fn evaluate<P: VerifierPolicy + ?Sized>(
    policy: &mut P,
    chain: Chain,
    cancel: &CancellationToken,
) -> Result<Result<Chain, PolicyFailure>, XchainError> {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(XchainError::Cancelled),
        outcome = policy.chain_meets_policy(&chain) => outcome,
    };
    match outcome {
        PolicyOutcome::MeetsPolicy => Ok(Ok(chain)),
        PolicyOutcome::FailsToMeetPolicy(violation) => {
            debug!(length = chain.len(), reason = %violation, "chain fails policy");
            Ok(Err(PolicyFailure { chain, violation }))
        }
    }
}
