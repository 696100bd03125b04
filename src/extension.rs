// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decoded X.509 extension values consulted during trust evaluation.
//!
//! Only extensions the path validator and policy engine act on are
//! modeled. The decoder collaborator is responsible for mapping raw
//! extension payloads onto these values.

use {
    bcder::{ConstOid, Oid},
    bitflags::bitflags,
    bytes::Bytes,
};

/// Extended Key Usage purpose for TLS server authentication.
///
/// 1.3.6.1.5.5.7.3.1
pub const OID_EKU_SERVER_AUTH: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 1]);

/// Extended Key Usage purpose for TLS client authentication.
///
/// 1.3.6.1.5.5.7.3.2
pub const OID_EKU_CLIENT_AUTH: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 2]);

/// Extended Key Usage purpose for code signing.
///
/// 1.3.6.1.5.5.7.3.3
pub const OID_EKU_CODE_SIGNING: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 3]);

/// Extended Key Usage purpose for IPSec end systems.
///
/// 1.3.6.1.5.5.7.3.5
pub const OID_EKU_IPSEC_END_SYSTEM: ConstOid = Oid(&[43, 6, 1, 5, 5, 7, 3, 5]);

/// Marker extension for `TV App Signing` (production).
///
/// 1.2.840.113635.100.6.1.24
pub const OID_MARKER_TV_APP_SIGNING: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 99, 100, 6, 1, 24]);

/// Marker extension for `TV App Signing` (test).
///
/// Distinct from the production marker; a production policy must never
/// accept a chain carrying only this marker, and vice versa.
///
/// 1.2.840.113635.100.6.1.24.1
pub const OID_MARKER_TV_APP_SIGNING_TEST: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 99, 100, 6, 1, 24, 1]);

/// Marker extension for `iPhone OS Application Signing`.
///
/// 1.2.840.113635.100.6.1.3
pub const OID_MARKER_IPHONE_OS_APPLICATION_SIGNING: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 99, 100, 6, 1, 3]);

/// Marker extension carried by the Worldwide Developer Relations
/// intermediate certificate authority.
///
/// 1.2.840.113635.100.6.2.1
pub const OID_MARKER_WWDR_INTERMEDIATE: ConstOid =
    Oid(&[42, 134, 72, 134, 247, 99, 100, 6, 2, 1]);

/// Convert a const OID reference into an owned [Oid].
pub fn owned_oid(oid: &ConstOid) -> Oid {
    Oid(Bytes::copy_from_slice(oid.as_ref()))
}

/// Basic Constraints extension value (2.5.29.19).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BasicConstraints {
    /// Whether the subject is a certificate authority.
    pub is_ca: bool,

    /// Maximum number of non-self-issued intermediate certificates that
    /// may follow this certificate in a valid certification path.
    pub path_length: Option<u32>,
}

bitflags! {
    /// Key Usage extension bits (2.5.29.15).
    pub struct KeyUsage: u16 {
        const DIGITAL_SIGNATURE = 0x0001;
        const NON_REPUDIATION = 0x0002;
        const KEY_ENCIPHERMENT = 0x0004;
        const DATA_ENCIPHERMENT = 0x0008;
        const KEY_AGREEMENT = 0x0010;
        const KEY_CERT_SIGN = 0x0020;
        const CRL_SIGN = 0x0040;
        const ENCIPHER_ONLY = 0x0080;
        const DECIPHER_ONLY = 0x0100;
    }
}

/// The set of decoded extensions attached to one certificate.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExtensionSet {
    /// Basic Constraints, if present.
    pub basic_constraints: Option<BasicConstraints>,

    /// Key Usage bits, if present.
    pub key_usage: Option<KeyUsage>,

    /// Extended Key Usage purpose OIDs, in certificate order.
    pub extended_key_usage: Vec<Oid>,

    /// DNS entries from the Subject Alternative Name extension.
    pub subject_alternative_dns_names: Vec<String>,

    /// Application-specific marker OID extensions present on the
    /// certificate. The payloads carry no constraint; presence is all
    /// policies test for.
    pub marker_oids: Vec<Oid>,
}

impl ExtensionSet {
    /// Whether the certificate declares the given EKU purpose.
    pub fn has_extended_key_usage(&self, oid: &Oid) -> bool {
        self.extended_key_usage.iter().any(|candidate| candidate == oid)
    }

    /// Whether the certificate carries the given marker OID extension.
    pub fn has_marker_oid(&self, oid: &Oid) -> bool {
        self.marker_oids.iter().any(|candidate| candidate == oid)
    }

    /// Whether the certificate is marked as a certificate authority.
    ///
    /// Absence of Basic Constraints counts as not-a-CA.
    pub fn is_certificate_authority(&self) -> bool {
        self.basic_constraints.map(|bc| bc.is_ca).unwrap_or(false)
    }
}
