// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Defines the high-level interface to decoded X.509 certificates.
//!
//! This crate does not parse ASN.1/DER itself: a decoder collaborator
//! (see [CertificateDecoder]) is expected to produce [Certificate]
//! values from raw bytes. Once constructed, a certificate is an
//! immutable value; chains reference certificates, never copy them.

use {
    crate::{
        algorithm::{KeyAlgorithm, SignatureAlgorithm},
        extension::ExtensionSet,
        TrustError,
    },
    bytes::Bytes,
    chrono::{DateTime, Utc},
    ring::digest,
    std::{
        fmt::{Display, Formatter},
        sync::Arc,
    },
};

/// A single attribute type within a distinguished name.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum NameAttribute {
    CommonName,
    Organization,
    OrganizationalUnit,
    Country,
    /// Any attribute this crate has no dedicated variant for, keyed by
    /// its dotted-decimal OID string.
    Other(String),
}

impl NameAttribute {
    fn short_name(&self) -> &str {
        match self {
            Self::CommonName => "CN",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
            Self::Country => "C",
            Self::Other(oid) => oid.as_str(),
        }
    }
}

/// An X.500 distinguished name as an ordered attribute sequence.
///
/// Equality is strict sequence equality, which is the same assumption
/// chain building makes: an issuing certificate's subject is expected
/// to be byte-for-byte identical to the issued certificate's issuer.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Name {
    components: Vec<(NameAttribute, String)>,
}

impl Name {
    /// Construct a name containing a single Common Name attribute.
    pub fn with_common_name(value: impl ToString) -> Self {
        let mut name = Self::default();
        name.append_common_name(value);
        name
    }

    pub fn append(&mut self, attribute: NameAttribute, value: impl ToString) {
        self.components.push((attribute, value.to_string()));
    }

    pub fn append_common_name(&mut self, value: impl ToString) {
        self.append(NameAttribute::CommonName, value);
    }

    pub fn append_organization(&mut self, value: impl ToString) {
        self.append(NameAttribute::Organization, value);
    }

    pub fn append_country(&mut self, value: impl ToString) {
        self.append(NameAttribute::Country, value);
    }

    /// The first Common Name attribute, if any.
    pub fn common_name(&self) -> Option<&str> {
        self.components
            .iter()
            .find(|(attribute, _)| matches!(attribute, NameAttribute::CommonName))
            .map(|(_, value)| value.as_str())
    }

    pub fn components(&self) -> &[(NameAttribute, String)] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (attribute, value) in &self.components {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", attribute.short_name(), value)?;
            first = false;
        }
        Ok(())
    }
}

/// Algorithm, size, and raw data of a certificate's public key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKeyDescriptor {
    pub algorithm: KeyAlgorithm,

    /// Key size in bits: RSA modulus size or EC curve size.
    pub bits: u32,

    /// Raw public key data, in whatever form the signature verifier
    /// collaborator expects (e.g. DER SubjectPublicKey octets for ring).
    pub key_data: Bytes,
}

/// An immutable decoded X.509 certificate.
///
/// Instances are produced by a decoder collaborator via
/// [CertificateBuilder] and never mutated afterwards. The SHA-256
/// fingerprint over the original encoded bytes serves as identity for
/// deduplication and anchor matching.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Certificate {
    subject: Name,
    issuer: Name,
    serial_number: Bytes,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key: PublicKeyDescriptor,
    signature_algorithm: SignatureAlgorithm,
    subject_key_identifier: Option<Bytes>,
    authority_key_identifier: Option<Bytes>,
    extensions: ExtensionSet,
    tbs_data: Bytes,
    signature: Bytes,
    constructed_data: Bytes,
    fingerprint: [u8; 32],
}

impl Certificate {
    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn serial_number(&self) -> &Bytes {
        &self.serial_number
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn public_key(&self) -> &PublicKeyDescriptor {
        &self.public_key
    }

    /// Raw data constituting this certificate's public key.
    pub fn public_key_data(&self) -> Bytes {
        self.public_key.key_data.clone()
    }

    pub fn key_algorithm(&self) -> KeyAlgorithm {
        self.public_key.algorithm
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.signature_algorithm
    }

    pub fn subject_key_identifier(&self) -> Option<&Bytes> {
        self.subject_key_identifier.as_ref()
    }

    pub fn authority_key_identifier(&self) -> Option<&Bytes> {
        self.authority_key_identifier.as_ref()
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// The to-be-signed content the certificate's signature covers.
    pub fn tbs_data(&self) -> &Bytes {
        &self.tbs_data
    }

    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// The encoded data this certificate was constructed from.
    pub fn constructed_data(&self) -> &Bytes {
        &self.constructed_data
    }

    /// SHA-256 digest over the encoded certificate data.
    pub fn fingerprint(&self) -> &[u8; 32] {
        &self.fingerprint
    }

    pub fn fingerprint_hex(&self) -> String {
        hex::encode(self.fingerprint)
    }

    /// Whether the subject [Name] is also the issuer's [Name].
    ///
    /// Name equality alone cannot prove a certificate signed itself,
    /// but chain construction and the validation exemptions for
    /// explicitly trusted anchors only need this weaker test.
    pub fn subject_is_issuer(&self) -> bool {
        self.subject == self.issuer
    }
}

/// Incrementally assembles an immutable [Certificate].
///
/// Intended for decoder collaborators that have already parsed the
/// DER structure and hold the individual field values.
#[derive(Clone, Debug, Default)]
pub struct CertificateBuilder {
    subject: Option<Name>,
    issuer: Option<Name>,
    serial_number: Option<Bytes>,
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
    public_key: Option<PublicKeyDescriptor>,
    signature_algorithm: Option<SignatureAlgorithm>,
    subject_key_identifier: Option<Bytes>,
    authority_key_identifier: Option<Bytes>,
    extensions: ExtensionSet,
    tbs_data: Option<Bytes>,
    signature: Option<Bytes>,
    constructed_data: Option<Bytes>,
}

impl CertificateBuilder {
    pub fn subject(mut self, name: Name) -> Self {
        self.subject = Some(name);
        self
    }

    pub fn issuer(mut self, name: Name) -> Self {
        self.issuer = Some(name);
        self
    }

    pub fn serial_number(mut self, serial: impl Into<Bytes>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn validity(mut self, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> Self {
        self.not_before = Some(not_before);
        self.not_after = Some(not_after);
        self
    }

    pub fn public_key(mut self, descriptor: PublicKeyDescriptor) -> Self {
        self.public_key = Some(descriptor);
        self
    }

    pub fn signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = Some(algorithm);
        self
    }

    pub fn subject_key_identifier(mut self, identifier: impl Into<Bytes>) -> Self {
        self.subject_key_identifier = Some(identifier.into());
        self
    }

    pub fn authority_key_identifier(mut self, identifier: impl Into<Bytes>) -> Self {
        self.authority_key_identifier = Some(identifier.into());
        self
    }

    pub fn extensions(mut self, extensions: ExtensionSet) -> Self {
        self.extensions = extensions;
        self
    }

    /// Set the to-be-signed content. Defaults to the full encoded data
    /// when not provided.
    pub fn tbs_data(mut self, data: impl Into<Bytes>) -> Self {
        self.tbs_data = Some(data.into());
        self
    }

    pub fn signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    /// Set the original encoded bytes. Required; certificate identity
    /// (the fingerprint) is derived from this data.
    pub fn constructed_data(mut self, data: impl Into<Bytes>) -> Self {
        self.constructed_data = Some(data.into());
        self
    }

    pub fn build(self) -> Result<Certificate, TrustError> {
        let subject = self
            .subject
            .ok_or(TrustError::CertificateIncomplete("subject"))?;
        let issuer = self
            .issuer
            .ok_or(TrustError::CertificateIncomplete("issuer"))?;
        let not_before = self
            .not_before
            .ok_or(TrustError::CertificateIncomplete("validity"))?;
        let not_after = self
            .not_after
            .ok_or(TrustError::CertificateIncomplete("validity"))?;
        let public_key = self
            .public_key
            .ok_or(TrustError::CertificateIncomplete("public key"))?;
        let signature_algorithm = self
            .signature_algorithm
            .ok_or(TrustError::CertificateIncomplete("signature algorithm"))?;
        let constructed_data = self
            .constructed_data
            .ok_or(TrustError::CertificateIncomplete("encoded data"))?;

        let tbs_data = self.tbs_data.unwrap_or_else(|| constructed_data.clone());
        let signature = self.signature.unwrap_or_else(Bytes::new);
        let serial_number = self.serial_number.unwrap_or_else(Bytes::new);

        let mut fingerprint = [0u8; 32];
        fingerprint
            .copy_from_slice(digest::digest(&digest::SHA256, constructed_data.as_ref()).as_ref());

        Ok(Certificate {
            subject,
            issuer,
            serial_number,
            not_before,
            not_after,
            public_key,
            signature_algorithm,
            subject_key_identifier: self.subject_key_identifier,
            authority_key_identifier: self.authority_key_identifier,
            extensions: self.extensions,
            tbs_data,
            signature,
            constructed_data,
            fingerprint,
        })
    }
}

/// External collaborator turning encoded certificate bytes into
/// [Certificate] values.
///
/// Decode failures are deterministic functions of the input and are
/// never retried by this crate.
pub trait CertificateDecoder: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<Arc<Certificate>, TrustError>;
}

#[cfg(test)]
mod test {
    use {super::*, crate::testutil::test_cert};

    #[test]
    fn name_display_and_common_name() {
        let mut name = Name::default();
        name.append_common_name("example.com");
        name.append_organization("Example Inc.");
        name.append_country("US");

        assert_eq!(format!("{}", name), "CN=example.com, O=Example Inc., C=US");
        assert_eq!(name.common_name(), Some("example.com"));
    }

    #[test]
    fn name_equality_is_ordered() {
        let mut a = Name::default();
        a.append_common_name("x");
        a.append_country("US");

        let mut b = Name::default();
        b.append_country("US");
        b.append_common_name("x");

        assert_ne!(a, b);
    }

    #[test]
    fn builder_rejects_missing_fields() {
        let err = CertificateBuilder::default()
            .subject(Name::with_common_name("leaf"))
            .build()
            .unwrap_err();
        assert!(matches!(err, TrustError::CertificateIncomplete("issuer")));
    }

    #[test]
    fn fingerprint_identity() {
        let a = test_cert("a", "root").build();
        let b = test_cert("b", "root").build();
        let a_again = test_cert("a", "root").build();

        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a_again.fingerprint());
        assert_eq!(a.fingerprint_hex().len(), 64);
    }

    #[test]
    fn self_signed_detection() {
        let root = test_cert("root", "root").ca().build();
        let leaf = test_cert("leaf", "root").build();

        assert!(root.subject_is_issuer());
        assert!(!leaf.subject_is_issuer());
    }

    #[test]
    fn stub_decoder_collaborator() {
        struct StubDecoder;

        impl CertificateDecoder for StubDecoder {
            fn decode(&self, data: &[u8]) -> Result<Arc<Certificate>, TrustError> {
                if data.is_empty() {
                    return Err(TrustError::CertificateDecode("empty input".into()));
                }
                Ok(test_cert("stub", "stub").build())
            }
        }

        let decoder = StubDecoder;
        assert!(decoder.decode(&[]).is_err());
        assert_eq!(
            decoder.decode(b"anything").unwrap().subject().common_name(),
            Some("stub")
        );
    }
}
