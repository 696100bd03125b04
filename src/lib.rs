// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Certificate chain trust evaluation.
//!
//! This crate decides whether an X.509 certificate should be trusted:
//! it discovers candidate certification paths from a leaf certificate
//! to a trusted anchor, validates each path's structural and
//! cryptographic constraints, applies use-case policies (TLS hostname
//! matching, application-signing markers, anchor pinning), and reports
//! a verdict with a prioritized error list.
//!
//! ASN.1/DER parsing and cryptographic key handling are deliberately
//! out of scope. Callers supply decoded [Certificate] values through a
//! [CertificateDecoder] collaborator; signature verification defaults
//! to a ring-backed implementation and can be replaced through the
//! [SignatureVerifier] trait.
//!
//! The typical entry point is [TrustContext]:
//!
//! ```ignore
//! let mut context = TrustContext::new(vec![leaf, intermediate], vec![Policy::ssl_server("example.com")]);
//! context.set_anchors(Some(vec![root]));
//! match context.evaluate()? {
//!     result if result.is_trusted() => { /* proceed */ }
//!     _ => {
//!         for error in context.errors() {
//!             eprintln!("{}", error);
//!         }
//!     }
//! }
//! ```

pub mod algorithm;
pub mod certificate;
pub mod chain;
pub mod error;
pub mod extension;
pub mod policy;
pub mod serialization;
#[cfg(test)]
pub(crate) mod testutil;
pub mod trust;
pub mod validate;

pub use crate::{
    algorithm::{DigestAlgorithm, KeyAlgorithm, SignatureAlgorithm, StrengthPolicy},
    certificate::{
        Certificate, CertificateBuilder, CertificateDecoder, Name, NameAttribute,
        PublicKeyDescriptor,
    },
    chain::{CandidateChain, ChainBuilder, IssuerSource, DEFAULT_MAX_CHAIN_DEPTH},
    error::{TrustError, ValidationError, ValidationFailure},
    extension::{BasicConstraints, ExtensionSet, KeyUsage},
    policy::{hostname_matches, Policy, PolicyEngine, PolicyKind, SigningEnvironment},
    serialization::{deserialize_context, serialize_context},
    trust::{TrustContext, TrustResult},
    validate::{PathValidator, RingVerifier, SignatureVerifier},
};
