// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Synthetic certificates for exercising chain building, validation,
//! and policy logic without a DER parser or real key material.

use {
    crate::{
        algorithm::{KeyAlgorithm, SignatureAlgorithm},
        certificate::{Certificate, CertificateBuilder, Name, PublicKeyDescriptor},
        extension::{
            owned_oid, BasicConstraints, ExtensionSet, KeyUsage, OID_EKU_CLIENT_AUTH,
            OID_MARKER_TV_APP_SIGNING, OID_MARKER_TV_APP_SIGNING_TEST,
            OID_MARKER_WWDR_INTERMEDIATE,
        },
        policy::SigningEnvironment,
        validate::SignatureVerifier,
    },
    chrono::{DateTime, TimeZone, Utc},
    std::sync::Arc,
};

/// Verifier that accepts every signature, so structural and policy
/// behavior can be tested with synthetic key material.
pub struct AcceptAllVerifier;

impl SignatureVerifier for AcceptAllVerifier {
    fn verify(&self, _: &[u8], _: &[u8], _: &[u8], _: SignatureAlgorithm) -> bool {
        true
    }
}

/// Fluent factory for synthetic certificates. 2048-bit RSA with a
/// SHA-256 signature and a 2020-2030 validity window unless overridden.
pub struct TestCert {
    subject: String,
    issuer: String,
    serial: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    key_algorithm: KeyAlgorithm,
    key_bits: u32,
    signature_algorithm: SignatureAlgorithm,
    subject_key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
    extensions: ExtensionSet,
}

pub fn test_cert(subject: &str, issuer: &str) -> TestCert {
    TestCert {
        subject: subject.to_string(),
        issuer: issuer.to_string(),
        serial: vec![1],
        not_before: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        not_after: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        key_algorithm: KeyAlgorithm::Rsa,
        key_bits: 2048,
        signature_algorithm: SignatureAlgorithm::Sha256Rsa,
        subject_key_id: None,
        authority_key_id: None,
        extensions: ExtensionSet::default(),
    }
}

impl TestCert {
    pub fn ca(mut self) -> Self {
        self.extensions.basic_constraints = Some(BasicConstraints {
            is_ca: true,
            path_length: None,
        });
        self
    }

    pub fn ca_with_path_length(mut self, length: u32) -> Self {
        self.extensions.basic_constraints = Some(BasicConstraints {
            is_ca: true,
            path_length: Some(length),
        });
        self
    }

    pub fn serial(mut self, serial: &[u8]) -> Self {
        self.serial = serial.to_vec();
        self
    }

    pub fn not_before(mut self, date: DateTime<Utc>) -> Self {
        self.not_before = date;
        self
    }

    pub fn not_after(mut self, date: DateTime<Utc>) -> Self {
        self.not_after = date;
        self
    }

    pub fn rsa_bits(mut self, bits: u32) -> Self {
        self.key_algorithm = KeyAlgorithm::Rsa;
        self.key_bits = bits;
        self
    }

    pub fn ec_bits(mut self, bits: u32) -> Self {
        self.key_algorithm = KeyAlgorithm::Ecdsa;
        self.key_bits = bits;
        self.signature_algorithm = SignatureAlgorithm::EcdsaSha256;
        self
    }

    /// Sign (and, when self-signed, anchor) with an MD5 digest.
    pub fn md5(mut self) -> Self {
        self.signature_algorithm = SignatureAlgorithm::Md5Rsa;
        self
    }

    pub fn key_usage(mut self, usage: KeyUsage) -> Self {
        self.extensions.key_usage = Some(usage);
        self
    }

    pub fn dns_name(mut self, name: &str) -> Self {
        self.extensions
            .subject_alternative_dns_names
            .push(name.to_string());
        self
    }

    pub fn client_auth_only(mut self) -> Self {
        self.extensions
            .extended_key_usage
            .push(owned_oid(&OID_EKU_CLIENT_AUTH));
        self
    }

    pub fn tv_marker(mut self, environment: SigningEnvironment) -> Self {
        let marker = match environment {
            SigningEnvironment::Production => owned_oid(&OID_MARKER_TV_APP_SIGNING),
            SigningEnvironment::Test => owned_oid(&OID_MARKER_TV_APP_SIGNING_TEST),
        };
        self.extensions.marker_oids.push(marker);
        self
    }

    pub fn wwdr_marker(mut self) -> Self {
        self.extensions
            .marker_oids
            .push(owned_oid(&OID_MARKER_WWDR_INTERMEDIATE));
        self
    }

    pub fn subject_key_id(mut self, id: &[u8]) -> Self {
        self.subject_key_id = Some(id.to_vec());
        self
    }

    pub fn authority_key_id(mut self, id: &[u8]) -> Self {
        self.authority_key_id = Some(id.to_vec());
        self
    }

    pub fn build(self) -> Arc<Certificate> {
        // Stand-in for encoded bytes; distinct field values yield a
        // distinct fingerprint, identical values a stable one.
        let encoded = format!(
            "cert|{}|{}|{}|{}|{:?}|{}|{:?}|{:?}|{:?}|{:?}|{:?}",
            self.subject,
            self.issuer,
            hex::encode(&self.serial),
            self.not_before.timestamp(),
            self.key_algorithm,
            self.key_bits,
            self.signature_algorithm,
            self.subject_key_id,
            self.extensions.marker_oids,
            self.extensions.basic_constraints,
            self.extensions.key_usage,
        )
        .into_bytes();

        let mut builder = CertificateBuilder::default()
            .subject(Name::with_common_name(&self.subject))
            .issuer(Name::with_common_name(&self.issuer))
            .serial_number(self.serial)
            .validity(self.not_before, self.not_after)
            .public_key(PublicKeyDescriptor {
                algorithm: self.key_algorithm,
                bits: self.key_bits,
                key_data: format!("key|{}", self.subject).into_bytes().into(),
            })
            .signature_algorithm(self.signature_algorithm)
            .extensions(self.extensions)
            .signature(vec![0xAA; 8])
            .constructed_data(encoded);

        if let Some(id) = self.subject_key_id {
            builder = builder.subject_key_identifier(id);
        }
        if let Some(id) = self.authority_key_id {
            builder = builder.authority_key_identifier(id);
        }

        Arc::new(builder.build().expect("synthetic certificate is complete"))
    }
}
