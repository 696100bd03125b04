// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Candidate chain construction.
//!
//! Chain building orders certificates leaf-first and extends towards a
//! trust anchor by subject/issuer name matching, refined by key
//! identifiers when both sides carry them. Building is deliberately
//! permissive: it never verifies signatures or validity periods. Every
//! plausible path is surfaced as a candidate and the validator decides
//! which, if any, is acceptable.

use {
    crate::certificate::Certificate,
    log::{debug, warn},
    std::{collections::HashSet, sync::Arc},
};

/// Maximum number of certificates in a candidate chain, leaf included.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 10;

/// A potential certification path, ordered leaf first.
#[derive(Clone, Debug)]
pub struct CandidateChain {
    certificates: Vec<Arc<Certificate>>,

    /// Whether the final certificate is one of the configured anchors.
    anchored: bool,

    /// Whether the chain terminates (at an anchor or a self-signed
    /// certificate) rather than dead-ending on a missing issuer.
    complete: bool,

    /// Whether any certificate came from an external issuer source
    /// rather than the caller-supplied set.
    used_external: bool,
}

impl CandidateChain {
    pub fn certificates(&self) -> &[Arc<Certificate>] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn leaf(&self) -> &Arc<Certificate> {
        &self.certificates[0]
    }

    pub fn terminal(&self) -> &Arc<Certificate> {
        &self.certificates[self.certificates.len() - 1]
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn used_external_issuer(&self) -> bool {
        self.used_external
    }
}

/// External collaborator supplying issuer certificates that were not
/// part of the caller-provided input, e.g. an AIA fetcher or a
/// system certificate store.
pub trait IssuerSource: Send + Sync {
    /// Return known certificates whose subject matches `subject` of the
    /// given certificate's issuer name. Implementations should return
    /// an empty vector rather than an error when nothing is known.
    fn issuers_for(&self, certificate: &Certificate) -> Vec<Arc<Certificate>>;
}

/// Work item during breadth-limited path search.
struct PartialPath {
    certificates: Vec<Arc<Certificate>>,
    used_external: bool,
}

/// Builds [CandidateChain]s from a leaf towards configured anchors.
pub struct ChainBuilder {
    intermediates: Vec<Arc<Certificate>>,
    anchors: Vec<Arc<Certificate>>,
    issuer_source: Option<Arc<dyn IssuerSource>>,
    max_depth: usize,
}

impl ChainBuilder {
    pub fn new(intermediates: Vec<Arc<Certificate>>, anchors: Vec<Arc<Certificate>>) -> Self {
        Self {
            intermediates,
            anchors,
            issuer_source: None,
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn issuer_source(mut self, source: Arc<dyn IssuerSource>) -> Self {
        self.issuer_source = Some(source);
        self
    }

    fn is_anchor(&self, certificate: &Certificate) -> bool {
        self.anchors
            .iter()
            .any(|anchor| anchor.fingerprint() == certificate.fingerprint())
    }

    /// Whether `issuer` plausibly issued `subject`, judged by names and
    /// key identifiers only.
    fn could_have_issued(subject: &Certificate, issuer: &Certificate) -> bool {
        if subject.issuer() != issuer.subject() {
            return false;
        }

        // Key identifiers disambiguate same-named CAs with rotated
        // keys, but their absence on either side is not a mismatch.
        if let (Some(authority), Some(subject_key)) = (
            subject.authority_key_identifier(),
            issuer.subject_key_identifier(),
        ) {
            if authority != subject_key {
                return false;
            }
        }

        true
    }

    /// Produce candidate chains for `leaf`, ordered most promising
    /// first: anchored chains (shortest first), then complete but
    /// unanchored chains, then dead-ended partial chains (longest
    /// first, so the best attempt is reported when nothing validates).
    pub fn build(&self, leaf: Arc<Certificate>) -> Vec<CandidateChain> {
        let mut anchored = Vec::new();
        let mut complete = Vec::new();
        let mut partial = Vec::new();

        let mut work = vec![PartialPath {
            certificates: vec![leaf],
            used_external: false,
        }];

        while let Some(path) = work.pop() {
            let tail = path.certificates[path.certificates.len() - 1].clone();

            // The leaf itself may be an anchor; a self-signed
            // certificate trusted directly yields a one-element chain.
            if self.is_anchor(&tail) {
                debug!(
                    "chain terminated at anchor {}",
                    tail.subject().common_name().unwrap_or("<unnamed>")
                );
                anchored.push(CandidateChain {
                    certificates: path.certificates,
                    anchored: true,
                    complete: true,
                    used_external: path.used_external,
                });
                continue;
            }

            if tail.subject_is_issuer() {
                complete.push(CandidateChain {
                    certificates: path.certificates,
                    anchored: false,
                    complete: true,
                    used_external: path.used_external,
                });
                continue;
            }

            if path.certificates.len() >= self.max_depth {
                warn!(
                    "abandoning path at depth limit {} below {}",
                    self.max_depth,
                    tail.subject()
                );
                partial.push(CandidateChain {
                    certificates: path.certificates,
                    anchored: false,
                    complete: false,
                    used_external: path.used_external,
                });
                continue;
            }

            let mut extended = false;
            let mut seen = HashSet::new();
            for cert in path.certificates.iter() {
                seen.insert(*cert.fingerprint());
            }

            // Anchors are preferred over same-subject intermediates so
            // the shortest anchored path surfaces even when a longer
            // route through intermediates also exists.
            let local = self.anchors.iter().chain(self.intermediates.iter());
            let external = self
                .issuer_source
                .as_ref()
                .map(|source| source.issuers_for(&tail))
                .unwrap_or_default();

            for (issuer, is_external) in local
                .map(|c| (c.clone(), false))
                .chain(external.into_iter().map(|c| (c, true)))
            {
                if seen.contains(issuer.fingerprint()) {
                    continue;
                }
                if !Self::could_have_issued(&tail, &issuer) {
                    continue;
                }

                let mut certificates = path.certificates.clone();
                certificates.push(issuer);
                work.push(PartialPath {
                    certificates,
                    used_external: path.used_external || is_external,
                });
                extended = true;
            }

            if !extended {
                partial.push(CandidateChain {
                    certificates: path.certificates,
                    anchored: false,
                    complete: false,
                    used_external: path.used_external,
                });
            }
        }

        anchored.sort_by_key(|chain| chain.len());
        complete.sort_by_key(|chain| chain.len());
        partial.sort_by_key(|chain| std::cmp::Reverse(chain.len()));

        anchored.extend(complete);
        anchored.extend(partial);
        anchored
    }
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::test_cert};

    #[test]
    fn three_certificate_chain() {
        let root = test_cert("root", "root").ca().build();
        let intermediate = test_cert("intermediate", "root").ca().build();
        let leaf = test_cert("leaf", "intermediate").build();

        let builder = ChainBuilder::new(vec![intermediate], vec![root]);
        let chains = builder.build(leaf);

        assert!(!chains.is_empty());
        let best = &chains[0];
        assert!(best.is_anchored());
        assert!(best.is_complete());
        assert_eq!(best.len(), 3);
        assert_eq!(best.leaf().subject().common_name(), Some("leaf"));
        assert_eq!(best.terminal().subject().common_name(), Some("root"));
    }

    #[test]
    fn anchored_intermediate_shortens_chain() {
        // When the intermediate itself is the anchor, the chain stops
        // there rather than continuing to the root.
        let root = test_cert("root", "root").ca().build();
        let intermediate = test_cert("intermediate", "root").ca().build();
        let leaf = test_cert("leaf", "intermediate").build();

        let builder = ChainBuilder::new(vec![root], vec![intermediate]);
        let chains = builder.build(leaf);

        let best = &chains[0];
        assert!(best.is_anchored());
        assert_eq!(best.len(), 2);
        assert_eq!(best.terminal().subject().common_name(), Some("intermediate"));
    }

    #[test]
    fn self_signed_leaf_as_own_anchor() {
        let cert = test_cert("self", "self").build();

        let builder = ChainBuilder::new(vec![], vec![cert.clone()]);
        let chains = builder.build(cert);

        let best = &chains[0];
        assert!(best.is_anchored());
        assert_eq!(best.len(), 1);
    }

    #[test]
    fn missing_anchor_yields_partial_chain() {
        let intermediate = test_cert("intermediate", "root").ca().build();
        let leaf = test_cert("leaf", "intermediate").build();

        let builder = ChainBuilder::new(vec![intermediate], vec![]);
        let chains = builder.build(leaf);

        // Best attempt is the longest partial path.
        assert!(!chains.is_empty());
        let best = &chains[0];
        assert!(!best.is_anchored());
        assert!(!best.is_complete());
        assert_eq!(best.len(), 2);
    }

    #[test]
    fn issuer_loop_terminates() {
        // Two CAs that issued each other's certificates must not send
        // the search into a cycle.
        let a = test_cert("a", "b").ca().build();
        let b = test_cert("b", "a").ca().build();
        let leaf = test_cert("leaf", "a").build();

        let builder = ChainBuilder::new(vec![a, b], vec![]);
        let chains = builder.build(leaf);

        assert!(!chains.is_empty());
        for chain in &chains {
            assert!(chain.len() <= 3);
        }
    }

    #[test]
    fn depth_limit_abandons_long_paths() {
        let mut intermediates = Vec::new();
        for i in 0..12 {
            intermediates.push(test_cert(&format!("ca{}", i + 1), &format!("ca{}", i + 2)).ca().build());
        }
        let leaf = test_cert("leaf", "ca1").build();

        let builder = ChainBuilder::new(intermediates, vec![]).max_depth(4);
        let chains = builder.build(leaf);

        for chain in &chains {
            assert!(chain.len() <= 4);
        }
    }

    #[test]
    fn external_issuer_source_is_flagged() {
        struct Store(Vec<Arc<Certificate>>);

        impl IssuerSource for Store {
            fn issuers_for(&self, certificate: &Certificate) -> Vec<Arc<Certificate>> {
                self.0
                    .iter()
                    .filter(|c| c.subject() == certificate.issuer())
                    .cloned()
                    .collect()
            }
        }

        let root = test_cert("root", "root").ca().build();
        let intermediate = test_cert("intermediate", "root").ca().build();
        let leaf = test_cert("leaf", "intermediate").build();

        let builder = ChainBuilder::new(vec![], vec![root])
            .issuer_source(Arc::new(Store(vec![intermediate])));
        let chains = builder.build(leaf);

        let best = &chains[0];
        assert!(best.is_anchored());
        assert!(best.used_external_issuer());
        assert_eq!(best.len(), 3);
    }

    #[test]
    fn key_identifier_disambiguates_rotated_ca() {
        let old_root = test_cert("root", "root")
            .ca()
            .subject_key_id(&[1; 8])
            .build();
        let new_root = test_cert("root", "root")
            .ca()
            .subject_key_id(&[2; 8])
            .serial(&[2])
            .build();
        let leaf = test_cert("leaf", "root").authority_key_id(&[2; 8]).build();

        let builder = ChainBuilder::new(vec![], vec![old_root, new_root]);
        let chains = builder.build(leaf);

        let best = &chains[0];
        assert!(best.is_anchored());
        assert_eq!(best.terminal().subject_key_identifier().map(|b| b.as_ref()), Some(&[2u8; 8][..]));
    }
}
