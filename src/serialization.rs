// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Persistence of trust contexts as opaque CBOR blobs.
//!
//! The blob captures the evaluation inputs: input certificates
//! (order-preserving), anchor overrides (set semantics), the
//! anchors-only flag, and the verification date. Resolved results are
//! not captured; a deserialized context re-evaluates on demand.

use {
    crate::{
        algorithm::{KeyAlgorithm, SignatureAlgorithm},
        certificate::{Certificate, CertificateBuilder, Name, NameAttribute, PublicKeyDescriptor},
        extension::{BasicConstraints, ExtensionSet, KeyUsage},
        policy::Policy,
        trust::TrustContext,
        TrustError,
    },
    bcder::Oid,
    chrono::{DateTime, TimeZone, Utc},
    minicbor::{Decode, Encode},
    std::sync::Arc,
};

#[derive(Clone, Debug, Decode, Encode)]
#[cbor(array)]
struct NameComponentRecord {
    #[n(0)]
    attribute: String,
    #[n(1)]
    value: String,
}

#[derive(Clone, Debug, Decode, Encode)]
#[cbor(array)]
struct TimeRecord {
    #[n(0)]
    seconds: i64,
    #[n(1)]
    nanoseconds: u32,
}

#[derive(Clone, Debug, Decode, Encode)]
#[cbor(array)]
struct BasicConstraintsRecord {
    #[n(0)]
    is_ca: bool,
    #[n(1)]
    path_length: Option<u32>,
}

#[derive(Clone, Debug, Decode, Encode)]
#[cbor(array)]
struct CertificateRecord {
    #[n(0)]
    subject: Vec<NameComponentRecord>,
    #[n(1)]
    issuer: Vec<NameComponentRecord>,
    #[n(2)]
    serial_number: Vec<u8>,
    #[n(3)]
    not_before: TimeRecord,
    #[n(4)]
    not_after: TimeRecord,
    #[n(5)]
    key_algorithm: u8,
    #[n(6)]
    key_bits: u32,
    #[n(7)]
    key_data: Vec<u8>,
    #[n(8)]
    signature_algorithm: u8,
    #[n(9)]
    subject_key_identifier: Option<Vec<u8>>,
    #[n(10)]
    authority_key_identifier: Option<Vec<u8>>,
    #[n(11)]
    basic_constraints: Option<BasicConstraintsRecord>,
    #[n(12)]
    key_usage: Option<u16>,
    #[n(13)]
    extended_key_usage: Vec<Vec<u8>>,
    #[n(14)]
    dns_names: Vec<String>,
    #[n(15)]
    marker_oids: Vec<Vec<u8>>,
    #[n(16)]
    tbs_data: Vec<u8>,
    #[n(17)]
    signature: Vec<u8>,
    #[n(18)]
    constructed_data: Vec<u8>,
}

#[derive(Clone, Debug, Decode, Encode)]
#[cbor(array)]
struct ContextRecord {
    #[n(0)]
    certificates: Vec<CertificateRecord>,
    #[n(1)]
    anchors: Option<Vec<CertificateRecord>>,
    #[n(2)]
    anchors_only: bool,
    #[n(3)]
    verification_date: Option<TimeRecord>,
}

fn encode_name(name: &Name) -> Vec<NameComponentRecord> {
    name.components()
        .iter()
        .map(|(attribute, value)| NameComponentRecord {
            attribute: match attribute {
                NameAttribute::CommonName => "CN".to_string(),
                NameAttribute::Organization => "O".to_string(),
                NameAttribute::OrganizationalUnit => "OU".to_string(),
                NameAttribute::Country => "C".to_string(),
                NameAttribute::Other(oid) => oid.clone(),
            },
            value: value.clone(),
        })
        .collect()
}

fn decode_name(components: Vec<NameComponentRecord>) -> Name {
    let mut name = Name::default();
    for component in components {
        let attribute = match component.attribute.as_str() {
            "CN" => NameAttribute::CommonName,
            "O" => NameAttribute::Organization,
            "OU" => NameAttribute::OrganizationalUnit,
            "C" => NameAttribute::Country,
            other => NameAttribute::Other(other.to_string()),
        };
        name.append(attribute, component.value);
    }
    name
}

fn encode_time(time: DateTime<Utc>) -> TimeRecord {
    TimeRecord {
        seconds: time.timestamp(),
        nanoseconds: time.timestamp_subsec_nanos(),
    }
}

fn decode_time(record: &TimeRecord) -> Result<DateTime<Utc>, TrustError> {
    Utc.timestamp_opt(record.seconds, record.nanoseconds)
        .single()
        .ok_or_else(|| {
            TrustError::Deserialization(format!(
                "timestamp {}.{} out of range",
                record.seconds, record.nanoseconds
            ))
        })
}

fn encode_key_algorithm(algorithm: KeyAlgorithm) -> u8 {
    match algorithm {
        KeyAlgorithm::Rsa => 0,
        KeyAlgorithm::Ecdsa => 1,
        KeyAlgorithm::Ed25519 => 2,
    }
}

fn decode_key_algorithm(value: u8) -> Result<KeyAlgorithm, TrustError> {
    match value {
        0 => Ok(KeyAlgorithm::Rsa),
        1 => Ok(KeyAlgorithm::Ecdsa),
        2 => Ok(KeyAlgorithm::Ed25519),
        _ => Err(TrustError::Deserialization(format!(
            "unknown key algorithm tag {}",
            value
        ))),
    }
}

fn encode_signature_algorithm(algorithm: SignatureAlgorithm) -> u8 {
    match algorithm {
        SignatureAlgorithm::Md5Rsa => 0,
        SignatureAlgorithm::Sha1Rsa => 1,
        SignatureAlgorithm::Sha256Rsa => 2,
        SignatureAlgorithm::Sha512Rsa => 3,
        SignatureAlgorithm::EcdsaSha256 => 4,
        SignatureAlgorithm::Ed25519 => 5,
    }
}

fn decode_signature_algorithm(value: u8) -> Result<SignatureAlgorithm, TrustError> {
    match value {
        0 => Ok(SignatureAlgorithm::Md5Rsa),
        1 => Ok(SignatureAlgorithm::Sha1Rsa),
        2 => Ok(SignatureAlgorithm::Sha256Rsa),
        3 => Ok(SignatureAlgorithm::Sha512Rsa),
        4 => Ok(SignatureAlgorithm::EcdsaSha256),
        5 => Ok(SignatureAlgorithm::Ed25519),
        _ => Err(TrustError::Deserialization(format!(
            "unknown signature algorithm tag {}",
            value
        ))),
    }
}

fn encode_certificate(certificate: &Certificate) -> CertificateRecord {
    let extensions = certificate.extensions();

    CertificateRecord {
        subject: encode_name(certificate.subject()),
        issuer: encode_name(certificate.issuer()),
        serial_number: certificate.serial_number().to_vec(),
        not_before: encode_time(certificate.not_before()),
        not_after: encode_time(certificate.not_after()),
        key_algorithm: encode_key_algorithm(certificate.public_key().algorithm),
        key_bits: certificate.public_key().bits,
        key_data: certificate.public_key().key_data.to_vec(),
        signature_algorithm: encode_signature_algorithm(certificate.signature_algorithm()),
        subject_key_identifier: certificate.subject_key_identifier().map(|b| b.to_vec()),
        authority_key_identifier: certificate.authority_key_identifier().map(|b| b.to_vec()),
        basic_constraints: extensions
            .basic_constraints
            .as_ref()
            .map(|constraints| BasicConstraintsRecord {
                is_ca: constraints.is_ca,
                path_length: constraints.path_length,
            }),
        key_usage: extensions.key_usage.map(|usage| usage.bits()),
        extended_key_usage: extensions
            .extended_key_usage
            .iter()
            .map(|oid| oid.as_ref().to_vec())
            .collect(),
        dns_names: extensions.subject_alternative_dns_names.clone(),
        marker_oids: extensions
            .marker_oids
            .iter()
            .map(|oid| oid.as_ref().to_vec())
            .collect(),
        tbs_data: certificate.tbs_data().to_vec(),
        signature: certificate.signature().to_vec(),
        constructed_data: certificate.constructed_data().to_vec(),
    }
}

fn decode_certificate(record: CertificateRecord) -> Result<Arc<Certificate>, TrustError> {
    let extensions = ExtensionSet {
        basic_constraints: record.basic_constraints.map(|constraints| BasicConstraints {
            is_ca: constraints.is_ca,
            path_length: constraints.path_length,
        }),
        key_usage: record.key_usage.map(KeyUsage::from_bits_truncate),
        extended_key_usage: record
            .extended_key_usage
            .into_iter()
            .map(|bytes| Oid(bytes.into()))
            .collect(),
        subject_alternative_dns_names: record.dns_names,
        marker_oids: record
            .marker_oids
            .into_iter()
            .map(|bytes| Oid(bytes.into()))
            .collect(),
    };

    let mut builder = CertificateBuilder::default()
        .subject(decode_name(record.subject))
        .issuer(decode_name(record.issuer))
        .serial_number(record.serial_number)
        .validity(
            decode_time(&record.not_before)?,
            decode_time(&record.not_after)?,
        )
        .public_key(PublicKeyDescriptor {
            algorithm: decode_key_algorithm(record.key_algorithm)?,
            bits: record.key_bits,
            key_data: record.key_data.into(),
        })
        .signature_algorithm(decode_signature_algorithm(record.signature_algorithm)?)
        .extensions(extensions)
        .tbs_data(record.tbs_data)
        .signature(record.signature)
        .constructed_data(record.constructed_data);

    if let Some(identifier) = record.subject_key_identifier {
        builder = builder.subject_key_identifier(identifier);
    }
    if let Some(identifier) = record.authority_key_identifier {
        builder = builder.authority_key_identifier(identifier);
    }

    Ok(Arc::new(builder.build()?))
}

/// Serialize a context's evaluation inputs to an opaque blob.
pub fn serialize_context(context: &TrustContext) -> Result<Vec<u8>, TrustError> {
    let record = ContextRecord {
        certificates: context
            .input_certificates()
            .iter()
            .map(|certificate| encode_certificate(certificate))
            .collect(),
        anchors: context.anchors().map(|anchors| {
            anchors
                .iter()
                .map(|certificate| encode_certificate(certificate))
                .collect()
        }),
        anchors_only: context.anchors_only(),
        verification_date: context.verification_date().map(encode_time),
    };

    minicbor::to_vec(&record).map_err(|e| TrustError::Serialization(e.to_string()))
}

/// Reconstruct a context from a blob produced by [serialize_context].
///
/// The result carries no policies and no resolved state; callers
/// attach policies and evaluate as with a freshly built context.
pub fn deserialize_context(data: &[u8]) -> Result<TrustContext, TrustError> {
    if data.is_empty() {
        return Err(TrustError::Param("empty context blob"));
    }

    let record: ContextRecord =
        minicbor::decode(data).map_err(|e| TrustError::Deserialization(e.to_string()))?;

    let certificates = record
        .certificates
        .into_iter()
        .map(decode_certificate)
        .collect::<Result<Vec<_>, _>>()?;

    let anchors = record
        .anchors
        .map(|anchors| {
            anchors
                .into_iter()
                .map(decode_certificate)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let mut context = TrustContext::new(certificates, Vec::<Policy>::new());
    context.set_anchors(anchors);
    context.set_anchors_only(record.anchors_only);
    context.set_verification_date(
        record
            .verification_date
            .as_ref()
            .map(decode_time)
            .transpose()?,
    );

    Ok(context)
}

impl TrustContext {
    /// See [serialize_context].
    pub fn serialize(&self) -> Result<Vec<u8>, TrustError> {
        serialize_context(self)
    }

    /// See [deserialize_context].
    pub fn deserialize(data: &[u8]) -> Result<TrustContext, TrustError> {
        deserialize_context(data)
    }
}
