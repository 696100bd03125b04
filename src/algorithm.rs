// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cryptographic algorithms commonly encountered in X.509 certificates
//! and the strength classification applied to them during trust
//! evaluation.

use {
    crate::TrustError as Error,
    bcder::{ConstOid, Oid},
    ring::signature,
    std::convert::TryFrom,
};

/// RSA encryption.
///
/// 1.2.840.113549.1.1.1
const OID_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 1]);

/// RSA+MD5 encryption.
///
/// 1.2.840.113549.1.1.4
const OID_MD5_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 4]);

/// RSA+SHA-1 encryption.
///
/// 1.2.840.113549.1.1.5
const OID_SHA1_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 5]);

/// RSA+SHA-256 encryption.
///
/// 1.2.840.113549.1.1.11
const OID_SHA256_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 11]);

/// RSA+SHA-512 encryption.
///
/// 1.2.840.113549.1.1.13
const OID_SHA512_RSA: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 1, 1, 13]);

/// ECDSA with SHA-256.
///
/// 1.2.840.10045.4.3.2
const OID_ECDSA_SHA256: ConstOid = Oid(&[42, 134, 72, 206, 61, 4, 3, 2]);

/// Elliptic curve public key cryptography.
///
/// 1.2.840.10045.2.1
const OID_EC_PUBLIC_KEY: ConstOid = Oid(&[42, 134, 72, 206, 61, 2, 1]);

/// ED25519 key agreement.
///
/// 1.3.101.110
const OID_ED25519_KEY_AGREEMENT: ConstOid = Oid(&[43, 101, 110]);

/// MD2 digest algorithm.
///
/// 1.2.840.113549.2.2
const OID_MD2: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 2, 2]);

/// MD5 digest algorithm.
///
/// 1.2.840.113549.2.5
const OID_MD5: ConstOid = Oid(&[42, 134, 72, 134, 247, 13, 2, 5]);

/// SHA-1 digest algorithm.
///
/// 1.3.14.3.2.26
const OID_SHA1: ConstOid = Oid(&[43, 14, 3, 2, 26]);

/// SHA-256 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.1
const OID_SHA256: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 1]);

/// SHA-512 digest algorithm.
///
/// 2.16.840.1.101.3.4.2.3
const OID_SHA512: ConstOid = Oid(&[96, 134, 72, 1, 101, 3, 4, 2, 3]);

/// Edwards curve digital signature algorithm.
///
/// 1.3.101.112
const OID_ED25519_SIGNATURE_ALGORITHM: ConstOid = Oid(&[43, 101, 112]);

/// A hashing algorithm used for digesting signed certificate content.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DigestAlgorithm {
    /// MD2. Broken; only seen on ancient certificates.
    Md2,
    /// MD5. Broken.
    Md5,
    /// SHA-1. Deprecated but still encountered on legacy chains.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
}

impl TryFrom<&Oid> for DigestAlgorithm {
    type Error = Error;

    fn try_from(v: &Oid) -> Result<Self, Self::Error> {
        if v == &OID_MD2 {
            Ok(Self::Md2)
        } else if v == &OID_MD5 {
            Ok(Self::Md5)
        } else if v == &OID_SHA1 {
            Ok(Self::Sha1)
        } else if v == &OID_SHA256 {
            Ok(Self::Sha256)
        } else if v == &OID_SHA512 {
            Ok(Self::Sha512)
        } else {
            Err(Error::UnknownDigestAlgorithm(format!("{}", v)))
        }
    }
}

impl From<DigestAlgorithm> for Oid {
    fn from(alg: DigestAlgorithm) -> Self {
        Oid(match alg {
            DigestAlgorithm::Md2 => OID_MD2.as_ref(),
            DigestAlgorithm::Md5 => OID_MD5.as_ref(),
            DigestAlgorithm::Sha1 => OID_SHA1.as_ref(),
            DigestAlgorithm::Sha256 => OID_SHA256.as_ref(),
            DigestAlgorithm::Sha512 => OID_SHA512.as_ref(),
        }
        .into())
    }
}

/// An algorithm used to digitally sign certificate content.
///
/// Instances can be converted from [Oid] via `TryFrom`, which is how a
/// certificate decoder collaborator is expected to obtain them.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum SignatureAlgorithm {
    /// MD5 with RSA encryption.
    ///
    /// Corresponds to OID 1.2.840.113549.1.1.4.
    Md5Rsa,

    /// SHA-1 with RSA encryption.
    ///
    /// Corresponds to OID 1.2.840.113549.1.1.5.
    Sha1Rsa,

    /// SHA-256 with RSA encryption.
    ///
    /// Corresponds to OID 1.2.840.113549.1.1.11.
    Sha256Rsa,

    /// SHA-512 with RSA encryption.
    ///
    /// Corresponds to OID 1.2.840.113549.1.1.13.
    Sha512Rsa,

    /// ECDSA with SHA-256.
    ///
    /// Corresponds to OID 1.2.840.10045.4.3.2.
    EcdsaSha256,

    /// ED25519.
    ///
    /// Corresponds to OID 1.3.101.112.
    Ed25519,
}

impl SignatureAlgorithm {
    /// The digest algorithm this signature algorithm hashes content with.
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        match self {
            Self::Md5Rsa => DigestAlgorithm::Md5,
            Self::Sha1Rsa => DigestAlgorithm::Sha1,
            Self::Sha256Rsa | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::Sha512Rsa | Self::Ed25519 => DigestAlgorithm::Sha512,
        }
    }

    /// Resolve a ring verification algorithm capable of verifying
    /// signatures produced with this algorithm.
    ///
    /// Returns `None` for algorithms ring refuses to verify (MD5).
    /// Callers reject those through digest strength policy instead.
    pub fn verification_algorithm(
        &self,
    ) -> Option<&'static dyn signature::VerificationAlgorithm> {
        match self {
            Self::Md5Rsa => None,
            Self::Sha1Rsa => Some(&signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY),
            Self::Sha256Rsa => Some(&signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY),
            Self::Sha512Rsa => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
            Self::EcdsaSha256 => Some(&signature::ECDSA_P256_SHA256_ASN1),
            Self::Ed25519 => Some(&signature::ED25519),
        }
    }
}

impl TryFrom<&Oid> for SignatureAlgorithm {
    type Error = Error;

    fn try_from(v: &Oid) -> Result<Self, Self::Error> {
        if v == &OID_MD5_RSA {
            Ok(Self::Md5Rsa)
        } else if v == &OID_SHA1_RSA {
            Ok(Self::Sha1Rsa)
        } else if v == &OID_SHA256_RSA {
            Ok(Self::Sha256Rsa)
        } else if v == &OID_SHA512_RSA {
            Ok(Self::Sha512Rsa)
        } else if v == &OID_ECDSA_SHA256 {
            Ok(Self::EcdsaSha256)
        } else if v == &OID_ED25519_SIGNATURE_ALGORITHM {
            Ok(Self::Ed25519)
        } else {
            Err(Error::UnknownSignatureAlgorithm(format!("{}", v)))
        }
    }
}

impl From<SignatureAlgorithm> for Oid {
    fn from(alg: SignatureAlgorithm) -> Self {
        Oid(match alg {
            SignatureAlgorithm::Md5Rsa => OID_MD5_RSA.as_ref(),
            SignatureAlgorithm::Sha1Rsa => OID_SHA1_RSA.as_ref(),
            SignatureAlgorithm::Sha256Rsa => OID_SHA256_RSA.as_ref(),
            SignatureAlgorithm::Sha512Rsa => OID_SHA512_RSA.as_ref(),
            SignatureAlgorithm::EcdsaSha256 => OID_ECDSA_SHA256.as_ref(),
            SignatureAlgorithm::Ed25519 => OID_ED25519_SIGNATURE_ALGORITHM.as_ref(),
        }
        .into())
    }
}

/// Cryptographic algorithm of a certificate's public key.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum KeyAlgorithm {
    /// RSA.
    ///
    /// Corresponds to OID 1.2.840.113549.1.1.1.
    Rsa,

    /// Corresponds to OID 1.2.840.10045.2.1.
    Ecdsa,

    /// Corresponds to OID 1.3.101.110.
    Ed25519,
}

impl TryFrom<&Oid> for KeyAlgorithm {
    type Error = Error;

    fn try_from(v: &Oid) -> Result<Self, Self::Error> {
        if v == &OID_RSA {
            Ok(Self::Rsa)
        } else if v == &OID_EC_PUBLIC_KEY {
            Ok(Self::Ecdsa)
        // ED25519 certificates are seen with both the key agreement and
        // the signature algorithm OID in the key field, so accept both.
        } else if v == &OID_ED25519_KEY_AGREEMENT || v == &OID_ED25519_SIGNATURE_ALGORITHM {
            Ok(Self::Ed25519)
        } else {
            Err(Error::UnknownKeyAlgorithm(format!("{}", v)))
        }
    }
}

impl From<KeyAlgorithm> for Oid {
    fn from(alg: KeyAlgorithm) -> Self {
        Oid(match alg {
            KeyAlgorithm::Rsa => OID_RSA.as_ref(),
            KeyAlgorithm::Ecdsa => OID_EC_PUBLIC_KEY.as_ref(),
            KeyAlgorithm::Ed25519 => OID_ED25519_KEY_AGREEMENT.as_ref(),
        }
        .into())
    }
}

/// Minimum key sizes and allowed digests applied during path validation.
///
/// The exact thresholds are a policy decision, not something derivable
/// from first principles, so they live in a value the caller can swap
/// out rather than as constants at the check sites.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StrengthPolicy {
    /// Minimum RSA modulus size in bits for leaf certificates.
    pub minimum_rsa_bits_leaf: u32,

    /// Minimum RSA modulus size in bits for CA certificates.
    pub minimum_rsa_bits_ca: u32,

    /// Minimum EC curve size in bits (leaf and CA alike).
    pub minimum_ec_bits: u32,

    /// Digest algorithms rejected on non-self-signed certificates.
    pub disallowed_digests: Vec<DigestAlgorithm>,
}

impl Default for StrengthPolicy {
    fn default() -> Self {
        Self {
            minimum_rsa_bits_leaf: 1024,
            minimum_rsa_bits_ca: 1024,
            minimum_ec_bits: 192,
            disallowed_digests: vec![DigestAlgorithm::Md2, DigestAlgorithm::Md5],
        }
    }
}

impl StrengthPolicy {
    /// Whether a public key of the given algorithm and size meets the floor.
    pub fn key_meets_floor(&self, algorithm: KeyAlgorithm, bits: u32, is_ca: bool) -> bool {
        match algorithm {
            KeyAlgorithm::Rsa => {
                let floor = if is_ca {
                    self.minimum_rsa_bits_ca
                } else {
                    self.minimum_rsa_bits_leaf
                };
                bits >= floor
            }
            KeyAlgorithm::Ecdsa => bits >= self.minimum_ec_bits,
            // Ed25519 keys have a single fixed size.
            KeyAlgorithm::Ed25519 => true,
        }
    }

    /// Whether the given digest algorithm is acceptable on a
    /// non-self-signed certificate.
    pub fn digest_allowed(&self, digest: DigestAlgorithm) -> bool {
        !self.disallowed_digests.contains(&digest)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn signature_algorithm_oid_round_trip() {
        for alg in [
            SignatureAlgorithm::Md5Rsa,
            SignatureAlgorithm::Sha1Rsa,
            SignatureAlgorithm::Sha256Rsa,
            SignatureAlgorithm::Sha512Rsa,
            SignatureAlgorithm::EcdsaSha256,
            SignatureAlgorithm::Ed25519,
        ] {
            let oid = Oid::from(alg);
            assert_eq!(SignatureAlgorithm::try_from(&oid).unwrap(), alg);
        }
    }

    #[test]
    fn digest_algorithm_oid_round_trip() {
        for alg in [
            DigestAlgorithm::Md2,
            DigestAlgorithm::Md5,
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha512,
        ] {
            let oid = Oid::from(alg);
            assert_eq!(DigestAlgorithm::try_from(&oid).unwrap(), alg);
        }

        let unknown = Oid(bytes::Bytes::copy_from_slice(&[1, 2, 3]));
        assert!(matches!(
            DigestAlgorithm::try_from(&unknown),
            Err(Error::UnknownDigestAlgorithm(_))
        ));
    }

    #[test]
    fn key_algorithm_from_oid() {
        let oid = Oid::from(KeyAlgorithm::Rsa);
        assert_eq!(KeyAlgorithm::try_from(&oid).unwrap(), KeyAlgorithm::Rsa);

        let unknown = Oid(bytes::Bytes::copy_from_slice(&[1, 2, 3]));
        assert!(KeyAlgorithm::try_from(&unknown).is_err());
    }

    #[test]
    fn default_strength_floors() {
        let policy = StrengthPolicy::default();

        assert!(policy.key_meets_floor(KeyAlgorithm::Rsa, 1024, false));
        assert!(policy.key_meets_floor(KeyAlgorithm::Rsa, 8192, false));
        assert!(!policy.key_meets_floor(KeyAlgorithm::Rsa, 512, false));
        assert!(!policy.key_meets_floor(KeyAlgorithm::Rsa, 512, true));

        assert!(policy.key_meets_floor(KeyAlgorithm::Ecdsa, 192, false));
        assert!(policy.key_meets_floor(KeyAlgorithm::Ecdsa, 384, true));
        assert!(!policy.key_meets_floor(KeyAlgorithm::Ecdsa, 128, false));

        assert!(!policy.digest_allowed(DigestAlgorithm::Md5));
        assert!(!policy.digest_allowed(DigestAlgorithm::Md2));
        assert!(policy.digest_allowed(DigestAlgorithm::Sha1));
        assert!(policy.digest_allowed(DigestAlgorithm::Sha256));
    }

    #[test]
    fn md5_has_no_ring_verifier() {
        assert!(SignatureAlgorithm::Md5Rsa.verification_algorithm().is_none());
        assert!(SignatureAlgorithm::Sha256Rsa
            .verification_algorithm()
            .is_some());
    }

    #[test]
    fn digest_of_signature_algorithm() {
        assert_eq!(
            SignatureAlgorithm::Md5Rsa.digest_algorithm(),
            DigestAlgorithm::Md5
        );
        assert_eq!(
            SignatureAlgorithm::EcdsaSha256.digest_algorithm(),
            DigestAlgorithm::Sha256
        );
    }
}
