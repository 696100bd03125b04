// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for trust evaluation.

use {
    std::fmt::{Display, Formatter},
    thiserror::Error,
};

/// Unified error type for certificate trust evaluation.
#[derive(Debug, Error)]
pub enum TrustError {
    #[error("parameter error: {0}")]
    Param(&'static str),

    #[error("certificate decode error: {0}")]
    CertificateDecode(String),

    #[error("certificate builder missing field: {0}")]
    CertificateIncomplete(&'static str),

    #[error("unknown key algorithm: {0}")]
    UnknownKeyAlgorithm(String),

    #[error("unknown signature algorithm: {0}")]
    UnknownSignatureAlgorithm(String),

    #[error("unknown digest algorithm: {0}")]
    UnknownDigestAlgorithm(String),

    #[error("trust context serialization error: {0}")]
    Serialization(String),

    #[error("trust context deserialization error: {0}")]
    Deserialization(String),
}

/// A specific reason a candidate certification path failed validation.
///
/// These codes are data, not control flow: the validator and policy
/// engine collect every failure they find and the evaluator reports
/// them ordered by [ValidationFailure::priority].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValidationFailure {
    /// Leaf certificate does not match the hostname a policy asked for.
    HostnameMismatch,

    /// A policy-required extension (EKU or marker OID) is absent.
    MissingRequiredExtension,

    /// A required intermediate/root pin was not found in the chain.
    InvalidRoot,

    /// The chain does not terminate at a trusted anchor.
    NotTrusted,

    /// No certification path could be constructed at all.
    NoValidChain,

    /// The verification date falls outside a certificate's validity window.
    CertificateExpired,

    /// An issuer's public key did not verify a child's signature.
    InvalidSignature,

    /// A non-leaf certificate is not marked as a certificate authority.
    InvalidBasicConstraints,

    /// A declared path length constraint was exceeded.
    InvalidPathLength,

    /// A public key is below the minimum size for its algorithm.
    WeakKey,

    /// A certificate is signed with a disallowed digest algorithm.
    InvalidDigestAlgorithm,

    /// A policy carried an option key the engine does not recognize.
    ///
    /// Only produced when the policy engine is configured strict;
    /// otherwise unrecognized options are logged and ignored.
    UnrecognizedPolicyOption,
}

impl ValidationFailure {
    /// Relative priority when choosing a single primary error.
    ///
    /// Higher values win. Identity rejections (hostname, pins, markers)
    /// outrank trust-anchor absence, which outranks expiration, which
    /// outranks the remaining structural defects: a caller should first
    /// learn that the identity itself was rejected before learning
    /// about secondary defects.
    pub fn priority(&self) -> u8 {
        match self {
            Self::HostnameMismatch | Self::MissingRequiredExtension | Self::InvalidRoot => 40,
            Self::NotTrusted | Self::NoValidChain => 30,
            Self::CertificateExpired => 20,
            Self::InvalidSignature
            | Self::InvalidBasicConstraints
            | Self::InvalidPathLength
            | Self::WeakKey
            | Self::InvalidDigestAlgorithm
            | Self::UnrecognizedPolicyOption => 10,
        }
    }
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::HostnameMismatch => "hostname mismatch",
            Self::MissingRequiredExtension => "missing required extension",
            Self::InvalidRoot => "invalid root",
            Self::NotTrusted => "not trusted",
            Self::NoValidChain => "no valid chain",
            Self::CertificateExpired => "certificate expired",
            Self::InvalidSignature => "invalid signature",
            Self::InvalidBasicConstraints => "invalid basic constraints",
            Self::InvalidPathLength => "invalid path length",
            Self::WeakKey => "weak key",
            Self::InvalidDigestAlgorithm => "invalid digest algorithm",
            Self::UnrecognizedPolicyOption => "unrecognized policy option",
        })
    }
}

/// A single validation failure with human-readable detail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValidationError {
    /// Machine-readable failure code.
    pub code: ValidationFailure,

    /// Human-readable explanation of this specific failure.
    pub message: String,

    /// Index of the offending certificate within the candidate chain
    /// (0 is the leaf), when the failure is attributable to one.
    pub certificate_index: Option<usize>,
}

impl ValidationError {
    pub fn new(code: ValidationFailure, message: impl ToString) -> Self {
        Self {
            code,
            message: message.to_string(),
            certificate_index: None,
        }
    }

    /// Attribute this failure to the certificate at `index` within the
    /// candidate chain (0 is the leaf).
    pub fn with_certificate(mut self, index: usize) -> Self {
        self.certificate_index = Some(index);
        self
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.certificate_index {
            Some(index) => write!(f, "{} (certificate {}): {}", self.code, index, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(
            ValidationFailure::HostnameMismatch.priority()
                > ValidationFailure::NotTrusted.priority()
        );
        assert!(
            ValidationFailure::NotTrusted.priority()
                > ValidationFailure::CertificateExpired.priority()
        );
        assert!(
            ValidationFailure::CertificateExpired.priority()
                > ValidationFailure::InvalidSignature.priority()
        );
        assert_eq!(
            ValidationFailure::MissingRequiredExtension.priority(),
            ValidationFailure::InvalidRoot.priority()
        );
    }

    #[test]
    fn error_display() {
        let e = ValidationError::new(ValidationFailure::WeakKey, "RSA key is 512 bits")
            .with_certificate(2);
        assert_eq!(format!("{}", e), "weak key (certificate 2): RSA key is 512 bits");
    }
}
