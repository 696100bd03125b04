// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Use-case policies layered atop generic path validation.
//!
//! A policy is an immutable named predicate over a resolved chain.
//! Multiple policies evaluate as a conjunction: the chain must satisfy
//! every supplied policy.

use {
    crate::{
        certificate::Certificate,
        chain::CandidateChain,
        error::{ValidationError, ValidationFailure},
        extension::{
            owned_oid, OID_EKU_CLIENT_AUTH, OID_EKU_SERVER_AUTH,
            OID_MARKER_TV_APP_SIGNING, OID_MARKER_TV_APP_SIGNING_TEST,
            OID_MARKER_WWDR_INTERMEDIATE,
        },
    },
    bcder::Oid,
    log::warn,
    std::collections::BTreeMap,
};

/// Which signing environment an application-signing policy accepts.
///
/// Production and test chains carry distinct marker OIDs and must
/// never cross-validate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SigningEnvironment {
    Production,
    Test,
}

/// The predicate a [Policy] applies to a chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PolicyKind {
    /// Generic structural validity only; no extra predicate.
    BasicX509,

    /// TLS peer policy: the leaf must match `hostname` and carry the
    /// extended key usage for the given role.
    Ssl {
        hostname: Option<String>,
        server: bool,
    },

    /// IPSec peer policy. Hostname matching as for SSL but the
    /// extended key usage requirement is deliberately lenient.
    IpSec { hostname: Option<String> },

    /// A custom OID extension must be present on the leaf.
    MarkerOid { oid: Oid },

    /// TV application signing: environment-specific marker on the
    /// leaf plus the issuing intermediate's marker.
    TvAppSigning { environment: SigningEnvironment },

    /// The chain must terminate at the certificate with this SHA-256
    /// fingerprint.
    PinnedAnchor { fingerprint: [u8; 32] },
}

/// A named, immutable evaluation policy.
///
/// Policies may carry free-form option keys for forward
/// compatibility. Unrecognized options are reported but tolerated in
/// release builds; the engine can be configured to fail on them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Policy {
    kind: PolicyKind,
    options: BTreeMap<String, String>,
}

impl Policy {
    pub fn basic_x509() -> Self {
        Self {
            kind: PolicyKind::BasicX509,
            options: BTreeMap::new(),
        }
    }

    pub fn ssl_server(hostname: impl ToString) -> Self {
        Self {
            kind: PolicyKind::Ssl {
                hostname: Some(hostname.to_string()),
                server: true,
            },
            options: BTreeMap::new(),
        }
    }

    pub fn ssl_client(hostname: Option<String>) -> Self {
        Self {
            kind: PolicyKind::Ssl {
                hostname,
                server: false,
            },
            options: BTreeMap::new(),
        }
    }

    pub fn ipsec(hostname: Option<String>) -> Self {
        Self {
            kind: PolicyKind::IpSec { hostname },
            options: BTreeMap::new(),
        }
    }

    pub fn marker_oid(oid: Oid) -> Self {
        Self {
            kind: PolicyKind::MarkerOid { oid },
            options: BTreeMap::new(),
        }
    }

    pub fn tv_app_signing(environment: SigningEnvironment) -> Self {
        Self {
            kind: PolicyKind::TvAppSigning { environment },
            options: BTreeMap::new(),
        }
    }

    pub fn pinned_anchor(fingerprint: [u8; 32]) -> Self {
        Self {
            kind: PolicyKind::PinnedAnchor { fingerprint },
            options: BTreeMap::new(),
        }
    }

    /// Attach a free-form option. Unknown keys are tolerated by
    /// default; see [PolicyEngine::strict_options].
    pub fn with_option(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    pub fn kind(&self) -> &PolicyKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        match &self.kind {
            PolicyKind::BasicX509 => "basic-x509",
            PolicyKind::Ssl { server: true, .. } => "ssl-server",
            PolicyKind::Ssl { server: false, .. } => "ssl-client",
            PolicyKind::IpSec { .. } => "ipsec",
            PolicyKind::MarkerOid { .. } => "marker-oid",
            PolicyKind::TvAppSigning { .. } => "tv-app-signing",
            PolicyKind::PinnedAnchor { .. } => "pinned-anchor",
        }
    }
}

/// Option keys every policy kind understands.
const KNOWN_OPTIONS: &[&str] = &["name", "label", "comment"];

/// Whether `hostname` matches `pattern` under the standard wildcard
/// rule: a single leftmost `*` label matches exactly one label.
pub fn hostname_matches(pattern: &str, hostname: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let hostname = hostname.to_ascii_lowercase();

    if pattern == hostname {
        return true;
    }

    let mut pattern_labels = pattern.split('.');
    if pattern_labels.next() != Some("*") {
        return false;
    }

    let mut hostname_labels = hostname.split('.');
    if hostname_labels.next().map_or(true, str::is_empty) {
        return false;
    }

    pattern_labels.eq(hostname_labels)
}

/// Evaluates policy conjunctions over resolved chains.
pub struct PolicyEngine {
    strict_options: bool,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self {
            strict_options: false,
        }
    }
}

impl PolicyEngine {
    /// Fail the evaluation when a policy carries an option key the
    /// engine does not understand, instead of logging and continuing.
    pub fn strict_options(mut self, strict: bool) -> Self {
        self.strict_options = strict;
        self
    }

    /// Apply every policy to `chain`, returning all errors found.
    pub fn evaluate(&self, policies: &[Policy], chain: &CandidateChain) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for policy in policies {
            self.check_options(policy, &mut errors);

            match &policy.kind {
                PolicyKind::BasicX509 => {}
                PolicyKind::Ssl { hostname, server } => {
                    if let Some(hostname) = hostname {
                        check_hostname(chain.leaf(), hostname, &mut errors);
                    }
                    let required = owned_oid(if *server {
                        &OID_EKU_SERVER_AUTH
                    } else {
                        &OID_EKU_CLIENT_AUTH
                    });
                    let extensions = chain.leaf().extensions();
                    // An absent EKU extension imposes no restriction;
                    // a present one must include the requested role.
                    if !extensions.extended_key_usage.is_empty()
                        && !extensions.has_extended_key_usage(&required)
                    {
                        errors.push(
                            ValidationError::new(
                                ValidationFailure::MissingRequiredExtension,
                                format!(
                                    "leaf extended key usage does not permit {} use",
                                    if *server { "server" } else { "client" }
                                ),
                            )
                            .with_certificate(0),
                        );
                    }
                }
                PolicyKind::IpSec { hostname } => {
                    if let Some(hostname) = hostname {
                        check_hostname(chain.leaf(), hostname, &mut errors);
                    }
                }
                PolicyKind::MarkerOid { oid } => {
                    if !chain.leaf().extensions().has_marker_oid(oid) {
                        errors.push(
                            ValidationError::new(
                                ValidationFailure::MissingRequiredExtension,
                                format!("leaf lacks required marker extension {}", oid),
                            )
                            .with_certificate(0),
                        );
                    }
                }
                PolicyKind::TvAppSigning { environment } => {
                    check_tv_app_signing(chain, *environment, &mut errors);
                }
                PolicyKind::PinnedAnchor { fingerprint } => {
                    if chain.terminal().fingerprint() != fingerprint {
                        errors.push(ValidationError::new(
                            ValidationFailure::InvalidRoot,
                            format!(
                                "chain terminates at {} instead of the pinned anchor",
                                chain.terminal().subject()
                            ),
                        ));
                    }
                }
            }
        }

        errors
    }

    fn check_options(&self, policy: &Policy, errors: &mut Vec<ValidationError>) {
        for key in policy.options.keys() {
            if KNOWN_OPTIONS.contains(&key.as_str()) {
                continue;
            }

            if self.strict_options {
                errors.push(ValidationError::new(
                    ValidationFailure::UnrecognizedPolicyOption,
                    format!("policy {} has unrecognized option {:?}", policy.name(), key),
                ));
            } else {
                warn!(
                    "ignoring unrecognized option {:?} on policy {}",
                    key,
                    policy.name()
                );
            }
        }
    }
}

fn check_hostname(leaf: &Certificate, hostname: &str, errors: &mut Vec<ValidationError>) {
    let names = &leaf.extensions().subject_alternative_dns_names;

    let matched = if names.is_empty() {
        // Subject common name is only consulted when no DNS subject
        // alternative names are present.
        leaf.subject()
            .common_name()
            .map_or(false, |cn| hostname_matches(cn, hostname))
    } else {
        names
            .iter()
            .any(|pattern| hostname_matches(pattern, hostname))
    };

    if !matched {
        errors.push(
            ValidationError::new(
                ValidationFailure::HostnameMismatch,
                format!("none of the leaf's names match {}", hostname),
            )
            .with_certificate(0),
        );
    }
}

fn check_tv_app_signing(
    chain: &CandidateChain,
    environment: SigningEnvironment,
    errors: &mut Vec<ValidationError>,
) {
    let marker = match environment {
        SigningEnvironment::Production => owned_oid(&OID_MARKER_TV_APP_SIGNING),
        SigningEnvironment::Test => owned_oid(&OID_MARKER_TV_APP_SIGNING_TEST),
    };

    if !chain.leaf().extensions().has_marker_oid(&marker) {
        errors.push(
            ValidationError::new(
                ValidationFailure::MissingRequiredExtension,
                format!(
                    "leaf is not signed for the {:?} application signing environment",
                    environment
                ),
            )
            .with_certificate(0),
        );
    }

    let wwdr = owned_oid(&OID_MARKER_WWDR_INTERMEDIATE);
    let has_intermediate_marker = chain
        .certificates()
        .iter()
        .skip(1)
        .any(|certificate| certificate.extensions().has_marker_oid(&wwdr));

    if chain.len() > 1 && !has_intermediate_marker {
        errors.push(ValidationError::new(
            ValidationFailure::MissingRequiredExtension,
            "no issuing intermediate carries the application signing marker".to_string(),
        ));
    }
}

#[cfg(test)]
mod test {
    use {
        super::*,
        crate::{chain::ChainBuilder, testutil::test_cert},
        std::sync::Arc,
    };

    fn chain_for(
        leaf: Arc<Certificate>,
        intermediates: Vec<Arc<Certificate>>,
        anchors: Vec<Arc<Certificate>>,
    ) -> CandidateChain {
        ChainBuilder::new(intermediates, anchors)
            .build(leaf)
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn wildcard_hostname_rules() {
        assert!(hostname_matches("example.com", "EXAMPLE.com"));
        assert!(hostname_matches("*.example.com", "www.example.com"));
        assert!(!hostname_matches("*.example.com", "example.com"));
        assert!(!hostname_matches("*.example.com", "a.b.example.com"));
        assert!(!hostname_matches("www.*.com", "www.example.com"));
        assert!(!hostname_matches("*.example.com", ".example.com"));
    }

    #[test]
    fn ssl_policy_matches_san_then_common_name() {
        let root = test_cert("root", "root").ca().build();
        let engine = PolicyEngine::default();

        let leaf = test_cert("fallback.example.com", "root").build();
        let chain = chain_for(leaf, vec![], vec![root.clone()]);
        assert!(engine
            .evaluate(&[Policy::ssl_server("fallback.example.com")], &chain)
            .is_empty());

        let leaf = test_cert("ignored-cn", "root")
            .dns_name("www.example.com")
            .build();
        let chain = chain_for(leaf, vec![], vec![root.clone()]);
        assert!(engine
            .evaluate(&[Policy::ssl_server("www.example.com")], &chain)
            .is_empty());

        // A SAN list, once present, makes the common name irrelevant.
        let leaf = test_cert("www.example.com", "root")
            .dns_name("other.example.com")
            .build();
        let chain = chain_for(leaf, vec![], vec![root]);
        let errors = engine.evaluate(&[Policy::ssl_server("www.example.com")], &chain);
        assert_eq!(errors[0].code, ValidationFailure::HostnameMismatch);
    }

    #[test]
    fn ssl_role_requires_matching_eku_when_present() {
        let root = test_cert("root", "root").ca().build();
        let leaf = test_cert("www.example.com", "root").client_auth_only().build();
        let chain = chain_for(leaf, vec![], vec![root]);

        let errors =
            PolicyEngine::default().evaluate(&[Policy::ssl_server("www.example.com")], &chain);
        assert_eq!(errors[0].code, ValidationFailure::MissingRequiredExtension);
    }

    #[test]
    fn ipsec_is_lenient_on_eku() {
        let root = test_cert("root", "root").ca().build();
        let leaf = test_cert("vpn.example.com", "root").client_auth_only().build();
        let chain = chain_for(leaf, vec![], vec![root]);

        assert!(PolicyEngine::default()
            .evaluate(
                &[Policy::ipsec(Some("vpn.example.com".to_string()))],
                &chain
            )
            .is_empty());
    }

    #[test]
    fn environments_never_cross_validate() {
        let root = test_cert("root", "root").ca().build();
        let intermediate = test_cert("intermediate", "root").ca().wwdr_marker().build();
        let engine = PolicyEngine::default();

        for (leaf_env, policy_env) in [
            (SigningEnvironment::Production, SigningEnvironment::Test),
            (SigningEnvironment::Test, SigningEnvironment::Production),
        ] {
            let leaf = test_cert("app", "intermediate").tv_marker(leaf_env).build();
            let chain = chain_for(leaf, vec![intermediate.clone()], vec![root.clone()]);

            let errors = engine.evaluate(&[Policy::tv_app_signing(policy_env)], &chain);
            assert!(
                errors
                    .iter()
                    .any(|e| e.code == ValidationFailure::MissingRequiredExtension),
                "{:?} leaf must not satisfy {:?} policy",
                leaf_env,
                policy_env
            );

            let errors = engine.evaluate(&[Policy::tv_app_signing(leaf_env)], &chain);
            assert!(errors.is_empty(), "{:?}", errors);
        }
    }

    #[test]
    fn pinned_anchor_mismatch_is_invalid_root() {
        let root = test_cert("root", "root").ca().build();
        let other = test_cert("other", "other").ca().build();
        let leaf = test_cert("leaf", "root").build();
        let chain = chain_for(leaf, vec![], vec![root]);

        let engine = PolicyEngine::default();
        let errors = engine.evaluate(&[Policy::pinned_anchor(*other.fingerprint())], &chain);
        assert_eq!(errors[0].code, ValidationFailure::InvalidRoot);

        let errors = engine.evaluate(
            &[Policy::pinned_anchor(*chain.terminal().fingerprint())],
            &chain,
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn unknown_options_tolerated_unless_strict() {
        let root = test_cert("root", "root").ca().build();
        let leaf = test_cert("leaf", "root").build();
        let chain = chain_for(leaf, vec![], vec![root]);

        let policy = Policy::basic_x509().with_option("future-knob", "1");

        assert!(PolicyEngine::default().evaluate(&[policy.clone()], &chain).is_empty());

        let errors = PolicyEngine::default()
            .strict_options(true)
            .evaluate(&[policy], &chain);
        assert_eq!(errors[0].code, ValidationFailure::UnrecognizedPolicyOption);
    }
}
