// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trust evaluation orchestration.
//!
//! A [TrustContext] owns one evaluation request: input certificates,
//! policies, anchor overrides, and the verification date. Evaluation
//! builds candidate chains, validates each, applies policies, and
//! records the best outcome. Mutating any input returns the context to
//! an unevaluated state; changing only the policy set keeps the
//! already-built chains.

use {
    crate::{
        certificate::Certificate,
        chain::{CandidateChain, ChainBuilder, IssuerSource, DEFAULT_MAX_CHAIN_DEPTH},
        error::{TrustError, ValidationError, ValidationFailure},
        policy::{Policy, PolicyEngine},
        validate::PathValidator,
    },
    chrono::{DateTime, Utc},
    log::debug,
    std::sync::Arc,
};

/// Outcome of a trust evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrustResult {
    /// Trusted by an explicit caller decision recorded on the anchor.
    Proceed,
    /// Trusted; the caller expressed no specific preference.
    Unspecified,
    /// A chain was built but validation or policy checks failed. The
    /// caller could choose to override.
    RecoverableFailure,
    /// No usable chain could be constructed. [ChainBuilder] always
    /// yields at least a leaf-only partial, so evaluation reports an
    /// unanchored chain as [TrustResult::RecoverableFailure] instead;
    /// this variant remains part of the result vocabulary for callers
    /// that persist or compare results.
    FatalFailure,
    /// Not yet evaluated, or the request itself was malformed.
    Invalid,
}

impl TrustResult {
    pub fn is_trusted(&self) -> bool {
        matches!(self, Self::Proceed | Self::Unspecified)
    }
}

/// Resolved state recorded by a completed evaluation.
#[derive(Clone, Debug)]
struct Evaluation {
    result: TrustResult,
    chain: Option<CandidateChain>,
    errors: Vec<ValidationError>,
}

/// Candidate chains and the instant they were evaluated against,
/// retained so a policy-only change can re-score without rebuilding.
#[derive(Clone, Debug)]
struct ChainCache {
    chains: Vec<CandidateChain>,
    effective_date: DateTime<Utc>,
}

/// A single trust evaluation request and its resolved state.
pub struct TrustContext {
    certificates: Vec<Arc<Certificate>>,
    policies: Vec<Policy>,
    anchors: Option<Vec<Arc<Certificate>>>,
    anchors_only: bool,
    verification_date: Option<DateTime<Utc>>,
    anchor_trust_proceed: bool,

    system_anchors: Vec<Arc<Certificate>>,
    issuer_source: Option<Arc<dyn IssuerSource>>,
    validator: PathValidator,
    engine: PolicyEngine,
    max_depth: usize,

    cache: Option<ChainCache>,
    evaluation: Option<Evaluation>,
}

impl TrustContext {
    /// Create a context over `certificates` (leaf first, intermediates
    /// in any order) evaluated against `policies`.
    pub fn new(certificates: Vec<Arc<Certificate>>, policies: Vec<Policy>) -> Self {
        Self {
            certificates,
            policies,
            anchors: None,
            anchors_only: true,
            verification_date: None,
            anchor_trust_proceed: false,
            system_anchors: Vec::new(),
            issuer_source: None,
            validator: PathValidator::default(),
            engine: PolicyEngine::default(),
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
            cache: None,
            evaluation: None,
        }
    }

    /// Anchors consulted when the caller supplies none, typically the
    /// platform trust store.
    pub fn with_system_anchors(mut self, anchors: Vec<Arc<Certificate>>) -> Self {
        self.system_anchors = anchors;
        self.invalidate_chains();
        self
    }

    pub fn with_issuer_source(mut self, source: Arc<dyn IssuerSource>) -> Self {
        self.issuer_source = Some(source);
        self.invalidate_chains();
        self
    }

    pub fn with_validator(mut self, validator: PathValidator) -> Self {
        self.validator = validator;
        self.invalidate_chains();
        self
    }

    pub fn with_policy_engine(mut self, engine: PolicyEngine) -> Self {
        self.engine = engine;
        self.evaluation = None;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self.invalidate_chains();
        self
    }

    pub fn input_certificates(&self) -> &[Arc<Certificate>] {
        &self.certificates
    }

    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    pub fn anchors(&self) -> Option<&[Arc<Certificate>]> {
        self.anchors.as_deref()
    }

    pub fn anchors_only(&self) -> bool {
        self.anchors_only
    }

    pub fn verification_date(&self) -> Option<DateTime<Utc>> {
        self.verification_date
    }

    pub fn add_certificate(&mut self, certificate: Arc<Certificate>) {
        self.certificates.push(certificate);
        self.invalidate_chains();
    }

    /// Replace the policy set. The chain cache survives; only the
    /// scoring is redone on the next evaluation.
    pub fn set_policies(&mut self, policies: Vec<Policy>) {
        self.policies = policies;
        self.evaluation = None;
    }

    /// Replace the anchor set. `Some(vec![])` is an explicit statement
    /// that nothing is trusted and evaluation will report
    /// [ValidationFailure::NotTrusted].
    pub fn set_anchors(&mut self, anchors: Option<Vec<Arc<Certificate>>>) {
        self.anchors = anchors;
        self.invalidate_chains();
    }

    /// When false, caller-supplied anchors augment the system anchors
    /// instead of replacing them.
    pub fn set_anchors_only(&mut self, anchors_only: bool) {
        self.anchors_only = anchors_only;
        self.invalidate_chains();
    }

    pub fn set_verification_date(&mut self, date: Option<DateTime<Utc>>) {
        self.verification_date = date;
        self.invalidate_chains();
    }

    /// Record that the caller explicitly chose to trust the anchor,
    /// upgrading a successful result from Unspecified to Proceed.
    pub fn set_anchor_trust_proceed(&mut self, proceed: bool) {
        self.anchor_trust_proceed = proceed;
        self.evaluation = None;
    }

    fn invalidate_chains(&mut self) {
        self.cache = None;
        self.evaluation = None;
    }

    fn effective_anchors(&self) -> Vec<Arc<Certificate>> {
        match (&self.anchors, self.anchors_only) {
            (Some(anchors), true) => anchors.clone(),
            (Some(anchors), false) => {
                let mut combined = anchors.clone();
                for anchor in &self.system_anchors {
                    if !combined
                        .iter()
                        .any(|existing| existing.fingerprint() == anchor.fingerprint())
                    {
                        combined.push(anchor.clone());
                    }
                }
                combined
            }
            (None, _) => self.system_anchors.clone(),
        }
    }

    /// Evaluate the context, or re-score the cached chains when only
    /// policy-level inputs changed since the last evaluation.
    ///
    /// Returns `Err` only for malformed requests; every well-formed
    /// request yields a [TrustResult] plus an error list retrievable
    /// from [TrustContext::errors].
    pub fn evaluate(&mut self) -> Result<TrustResult, TrustError> {
        if self.certificates.is_empty() {
            return Err(TrustError::Param("no input certificates"));
        }

        if let Some(evaluation) = &self.evaluation {
            return Ok(evaluation.result);
        }

        let anchors = self.effective_anchors();
        let anchors_empty = anchors.is_empty();

        if self.cache.is_none() {
            let mut builder = ChainBuilder::new(self.certificates[1..].to_vec(), anchors)
                .max_depth(self.max_depth);
            if let Some(source) = &self.issuer_source {
                builder = builder.issuer_source(source.clone());
            }

            self.cache = Some(ChainCache {
                chains: builder.build(self.certificates[0].clone()),
                effective_date: self.verification_date.unwrap_or_else(Utc::now),
            });
        }

        let cache = match &self.cache {
            Some(cache) => cache,
            None => return Err(TrustError::Param("chain cache unavailable")),
        };

        // The builder currently always returns at least the leaf-only
        // partial, so this branch is not reached by any input today.
        if cache.chains.is_empty() {
            self.evaluation = Some(Evaluation {
                result: TrustResult::FatalFailure,
                chain: None,
                errors: vec![ValidationError::new(
                    ValidationFailure::NoValidChain,
                    "no candidate chain could be built".to_string(),
                )],
            });
            return Ok(TrustResult::FatalFailure);
        }

        let mut best: Option<(Vec<ValidationError>, &CandidateChain)> = None;

        for chain in &cache.chains {
            let mut errors = self.validator.validate(chain, cache.effective_date);
            errors.extend(self.engine.evaluate(&self.policies, chain));

            if !chain.is_anchored() {
                let (code, message) = if anchors_empty {
                    (
                        ValidationFailure::NotTrusted,
                        "no anchor certificates are trusted".to_string(),
                    )
                } else {
                    (
                        ValidationFailure::NoValidChain,
                        format!(
                            "chain ends at {} without reaching a trusted anchor",
                            chain.terminal().subject()
                        ),
                    )
                };
                errors.push(ValidationError::new(code, message));
            }

            if errors.is_empty() {
                debug!(
                    "accepted {}-certificate chain terminating at {}",
                    chain.len(),
                    chain.terminal().subject()
                );
                let result = if self.anchor_trust_proceed {
                    TrustResult::Proceed
                } else {
                    TrustResult::Unspecified
                };
                self.evaluation = Some(Evaluation {
                    result,
                    chain: Some(chain.clone()),
                    errors: Vec::new(),
                });
                return Ok(result);
            }

            // Candidates arrive best-first, so ties keep the earlier
            // chain as the reported best attempt.
            let better = match &best {
                None => true,
                Some((existing, _)) => errors.len() < existing.len(),
            };
            if better {
                best = Some((errors, chain));
            }
        }

        let (mut errors, chain) = match best {
            Some(best) => best,
            None => return Err(TrustError::Param("no candidate chains scored")),
        };

        // Highest-priority cause first; simplified callers read only
        // the leading entry.
        errors.sort_by(|a, b| b.code.priority().cmp(&a.code.priority()));

        self.evaluation = Some(Evaluation {
            result: TrustResult::RecoverableFailure,
            chain: Some(chain.clone()),
            errors,
        });
        Ok(TrustResult::RecoverableFailure)
    }

    /// The outcome of the last evaluation, or [TrustResult::Invalid]
    /// when no evaluation has run since the last mutation.
    pub fn result(&self) -> TrustResult {
        self.evaluation
            .as_ref()
            .map(|evaluation| evaluation.result)
            .unwrap_or(TrustResult::Invalid)
    }

    /// The chain selected by the last evaluation. Populated even on
    /// failure so callers can inspect the best attempt.
    pub fn resolved_chain(&self) -> Option<&CandidateChain> {
        self.evaluation
            .as_ref()
            .and_then(|evaluation| evaluation.chain.as_ref())
    }

    /// Errors explaining the last result, highest priority first.
    pub fn errors(&self) -> &[ValidationError] {
        self.evaluation
            .as_ref()
            .map(|evaluation| evaluation.errors.as_slice())
            .unwrap_or_default()
    }

    /// The single most significant error, for simplified callers.
    pub fn primary_error(&self) -> Option<&ValidationError> {
        self.errors().first()
    }

    /// Evaluate and report the outcome together with the single
    /// highest-priority error, for callers that only act on one cause.
    pub fn evaluate_with_error(
        &mut self,
    ) -> Result<(TrustResult, Option<ValidationError>), TrustError> {
        let result = self.evaluate()?;
        Ok((result, self.primary_error().cloned()))
    }

    /// Public key of the leaf certificate, from the resolved chain
    /// when evaluated, otherwise from the first input certificate.
    pub fn leaf_public_key(&self) -> Option<&crate::certificate::PublicKeyDescriptor> {
        self.resolved_chain()
            .map(|chain| chain.leaf())
            .or_else(|| self.certificates.first())
            .map(|certificate| certificate.public_key())
    }

    /// Whether the last evaluation failed solely because of validity
    /// dates, i.e. the chain would be trusted at some other instant.
    pub fn is_expired_only(&self) -> bool {
        let errors = self.errors();
        !errors.is_empty()
            && errors
                .iter()
                .all(|error| error.code == ValidationFailure::CertificateExpired)
    }

    /// Number of certificates in the resolved chain, evaluating first
    /// if needed. A malformed context reports zero.
    pub fn certificate_count(&mut self) -> usize {
        if self.evaluation.is_none() && self.evaluate().is_err() {
            return 0;
        }

        self.resolved_chain().map(CandidateChain::len).unwrap_or(0)
    }

    pub fn certificate_at(&self, index: usize) -> Option<&Arc<Certificate>> {
        self.resolved_chain()
            .and_then(|chain| chain.certificates().get(index))
    }

    /// Evaluate on a worker thread and invoke `completion` with the
    /// context and its result. The work runs to completion once
    /// started; there is no mid-evaluation cancellation.
    pub fn evaluate_async<F>(mut self, completion: F) -> std::thread::JoinHandle<()>
    where
        F: FnOnce(TrustContext, Result<TrustResult, TrustError>) + Send + 'static,
    {
        std::thread::spawn(move || {
            let result = self.evaluate();
            completion(self, result);
        })
    }
}
