// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RFC 5280 style path validation over a candidate chain.
//!
//! Validation is deliberately exhaustive: every failed check on a
//! chain is collected rather than short-circuiting, so the evaluator
//! can report the complete, correctly prioritized error set.

use {
    crate::{
        algorithm::{SignatureAlgorithm, StrengthPolicy},
        certificate::Certificate,
        chain::CandidateChain,
        error::{ValidationError, ValidationFailure},
        extension::KeyUsage,
    },
    chrono::{DateTime, Utc},
    log::debug,
    ring::signature::UnparsedPublicKey,
    std::sync::Arc,
};

/// External collaborator verifying a signature over raw bytes.
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` over `tbs_data` verifies with `public_key`
    /// under `algorithm`. Deterministic; never retried.
    fn verify(
        &self,
        tbs_data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> bool;
}

/// [SignatureVerifier] backed by ring.
#[derive(Default)]
pub struct RingVerifier {}

impl SignatureVerifier for RingVerifier {
    fn verify(
        &self,
        tbs_data: &[u8],
        signature: &[u8],
        public_key: &[u8],
        algorithm: SignatureAlgorithm,
    ) -> bool {
        let verification_algorithm = match algorithm.verification_algorithm() {
            Some(alg) => alg,
            None => return false,
        };

        let key = UnparsedPublicKey::new(verification_algorithm, public_key);

        // Broken encoders emit ECDSA r/s as negative INTEGERs. Try the
        // normalized form before giving up on the raw bytes.
        if matches!(algorithm, SignatureAlgorithm::EcdsaSha256) {
            if let Some(normalized) = normalize_ecdsa_signature(signature) {
                if key.verify(tbs_data, &normalized).is_ok() {
                    return true;
                }
            }
        }

        key.verify(tbs_data, signature).is_ok()
    }
}

/// Re-encode an ECDSA-Sig-Value whose r or s INTEGER carries a
/// spurious negative encoding as its intended unsigned value.
///
/// Returns `None` when the input is not a well-formed two-INTEGER
/// SEQUENCE with short-form lengths, in which case the raw bytes are
/// used as-is.
pub fn normalize_ecdsa_signature(signature: &[u8]) -> Option<Vec<u8>> {
    fn read_integer(data: &[u8]) -> Option<(Vec<u8>, &[u8])> {
        if data.len() < 2 || data[0] != 0x02 {
            return None;
        }
        let length = data[1] as usize;
        if data[1] & 0x80 != 0 || data.len() < 2 + length || length == 0 {
            return None;
        }
        let value = &data[2..2 + length];

        // Strip redundant leading zeros, then re-add one if the top
        // bit would otherwise read as a sign bit.
        let mut trimmed = value;
        while trimmed.len() > 1 && trimmed[0] == 0 && trimmed[1] & 0x80 == 0 {
            trimmed = &trimmed[1..];
        }
        let mut normalized = Vec::with_capacity(trimmed.len() + 1);
        if trimmed[0] & 0x80 != 0 {
            normalized.push(0);
        }
        normalized.extend_from_slice(trimmed);

        Some((normalized, &data[2 + length..]))
    }

    if signature.len() < 2 || signature[0] != 0x30 {
        return None;
    }
    let body_length = signature[1] as usize;
    if signature[1] & 0x80 != 0 || signature.len() != 2 + body_length {
        return None;
    }

    let (r, rest) = read_integer(&signature[2..])?;
    let (s, rest) = read_integer(rest)?;
    if !rest.is_empty() || 4 + r.len() + s.len() > 127 {
        return None;
    }

    let mut out = Vec::with_capacity(6 + r.len() + s.len());
    out.push(0x30);
    out.push((4 + r.len() + s.len()) as u8);
    out.push(0x02);
    out.push(r.len() as u8);
    out.extend_from_slice(&r);
    out.push(0x02);
    out.push(s.len() as u8);
    out.extend_from_slice(&s);

    Some(out)
}

/// Applies structural and cryptographic checks to candidate chains.
pub struct PathValidator {
    strength: StrengthPolicy,
    verifier: Arc<dyn SignatureVerifier>,
}

impl Default for PathValidator {
    fn default() -> Self {
        Self {
            strength: StrengthPolicy::default(),
            verifier: Arc::new(RingVerifier::default()),
        }
    }
}

impl PathValidator {
    pub fn new(strength: StrengthPolicy, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { strength, verifier }
    }

    /// Validate `chain` as of `date`. An empty error list means the
    /// chain is structurally and cryptographically sound; policy
    /// checks are a separate concern.
    pub fn validate(&self, chain: &CandidateChain, date: DateTime<Utc>) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let certificates = chain.certificates();

        for (index, certificate) in certificates.iter().enumerate() {
            self.check_validity_window(certificate, index, date, &mut errors);
            self.check_basic_constraints(certificates, index, &mut errors);
            self.check_key_strength(certificate, index, certificates.len(), &mut errors);
        }

        for index in 0..certificates.len() {
            let child = &certificates[index];

            let issuer = if index + 1 < certificates.len() {
                &certificates[index + 1]
            } else if child.subject_is_issuer() {
                child
            } else {
                continue;
            };

            // Name linkage is established by chain construction; the
            // recheck guards against hand-assembled chains.
            if child.issuer() != issuer.subject() {
                errors.push(
                    ValidationError::new(
                        ValidationFailure::NoValidChain,
                        format!(
                            "issuer name mismatch: {} was not issued by {}",
                            child.subject(),
                            issuer.subject()
                        ),
                    )
                    .with_certificate(index),
                );
                continue;
            }

            self.check_signature(child, issuer, index, &mut errors);
        }

        errors
    }

    fn check_validity_window(
        &self,
        certificate: &Certificate,
        index: usize,
        date: DateTime<Utc>,
        errors: &mut Vec<ValidationError>,
    ) {
        if date < certificate.not_before() {
            errors.push(
                ValidationError::new(
                    ValidationFailure::CertificateExpired,
                    format!(
                        "certificate {} not yet valid (notBefore {})",
                        certificate.subject(),
                        certificate.not_before()
                    ),
                )
                .with_certificate(index),
            );
        } else if date > certificate.not_after() {
            errors.push(
                ValidationError::new(
                    ValidationFailure::CertificateExpired,
                    format!(
                        "certificate {} expired (notAfter {})",
                        certificate.subject(),
                        certificate.not_after()
                    ),
                )
                .with_certificate(index),
            );
        }
    }

    fn check_basic_constraints(
        &self,
        certificates: &[Arc<Certificate>],
        index: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        let certificate = &certificates[index];

        if index > 0 && !certificate.extensions().is_certificate_authority() {
            errors.push(
                ValidationError::new(
                    ValidationFailure::InvalidBasicConstraints,
                    format!(
                        "certificate {} used as an issuer but is not a CA",
                        certificate.subject()
                    ),
                )
                .with_certificate(index),
            );
        }

        // A Key Usage extension on an issuer must include keyCertSign;
        // absence of the extension imposes no restriction.
        if index > 0 {
            if let Some(usage) = certificate.extensions().key_usage {
                if !usage.contains(KeyUsage::KEY_CERT_SIGN) {
                    errors.push(
                        ValidationError::new(
                            ValidationFailure::InvalidBasicConstraints,
                            format!(
                                "certificate {} issues certificates but its key usage does not permit certificate signing",
                                certificate.subject()
                            ),
                        )
                        .with_certificate(index),
                    );
                }
            }
        }

        if let Some(constraints) = &certificate.extensions().basic_constraints {
            if let Some(max) = constraints.path_length {
                // The count of subordinate intermediates below this
                // certificate, leaf excluded.
                let subordinates = index.saturating_sub(1);
                if subordinates > max as usize {
                    errors.push(
                        ValidationError::new(
                            ValidationFailure::InvalidPathLength,
                            format!(
                                "certificate {} allows {} subordinate CAs but has {}",
                                certificate.subject(),
                                max,
                                subordinates
                            ),
                        )
                        .with_certificate(index),
                    );
                }
            }
        }
    }

    fn check_key_strength(
        &self,
        certificate: &Certificate,
        index: usize,
        chain_length: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        // A weak self-signed certificate that the caller explicitly
        // trusts as its own single-element chain is still honored.
        // Weak keys anywhere inside a longer path are rejected even on
        // a self-signed root.
        if certificate.subject_is_issuer() && chain_length == 1 {
            return;
        }

        let key = certificate.public_key();
        if !self
            .strength
            .key_meets_floor(key.algorithm, key.bits, index > 0)
        {
            errors.push(
                ValidationError::new(
                    ValidationFailure::WeakKey,
                    format!(
                        "certificate {} has a {}-bit {:?} key below the accepted floor",
                        certificate.subject(),
                        key.bits,
                        key.algorithm
                    ),
                )
                .with_certificate(index),
            );
        }
    }

    fn check_signature(
        &self,
        child: &Arc<Certificate>,
        issuer: &Arc<Certificate>,
        index: usize,
        errors: &mut Vec<ValidationError>,
    ) {
        let algorithm = child.signature_algorithm();

        if !self.strength.digest_allowed(algorithm.digest_algorithm()) {
            // A certificate carrying its own trust (self-signed) is
            // anchored by caller intent, not by hash strength.
            if child.subject_is_issuer() {
                debug!(
                    "accepting self-signed {} despite {:?} digest",
                    child.subject(),
                    algorithm.digest_algorithm()
                );
                return;
            }

            errors.push(
                ValidationError::new(
                    ValidationFailure::InvalidDigestAlgorithm,
                    format!(
                        "certificate {} signed with disallowed digest {:?}",
                        child.subject(),
                        algorithm.digest_algorithm()
                    ),
                )
                .with_certificate(index),
            );
            return;
        }

        if algorithm.verification_algorithm().is_none() {
            errors.push(
                ValidationError::new(
                    ValidationFailure::InvalidSignature,
                    format!(
                        "no verifier available for signature algorithm {:?}",
                        algorithm
                    ),
                )
                .with_certificate(index),
            );
            return;
        }

        if !self.verifier.verify(
            child.tbs_data(),
            child.signature(),
            issuer.public_key_data().as_ref(),
            algorithm,
        ) {
            errors.push(
                ValidationError::new(
                    ValidationFailure::InvalidSignature,
                    format!(
                        "signature on {} does not verify with key of {}",
                        child.subject(),
                        issuer.subject()
                    ),
                )
                .with_certificate(index),
            );
        }
    }
}
