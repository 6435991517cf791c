//! Decoding of the ASN.1 armors: PKCS#1, SEC1 and PKCS#8, the
//! latter optionally under PBES2 encryption.

use pkcs8::ObjectIdentifier;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;

use crate::{Error, PrivateKey, Result};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const NISTP256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const NISTP384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const NISTP521: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");

/// `RSA PRIVATE KEY`: a bare PKCS#1 `RSAPrivateKey` structure.
pub(crate) fn rsa_pkcs1(der: &[u8]) -> Result<PrivateKey> {
    rsa::RsaPrivateKey::from_pkcs1_der(der)
        .map(PrivateKey::Rsa)
        .map_err(|_| Error::Malformed)
}

/// `EC PRIVATE KEY`: a SEC1 `ECPrivateKey`, curve named inside.
pub(crate) fn ec_sec1(der: &[u8]) -> Result<PrivateKey> {
    if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcdsaP256(key.into()));
    }
    if let Ok(key) = p384::SecretKey::from_sec1_der(der) {
        return Ok(PrivateKey::EcdsaP384(key.into()));
    }
    if let Ok(key) = p521::SecretKey::from_sec1_der(der) {
        return p521::ecdsa::SigningKey::from_bytes(&key.to_bytes())
            .map(PrivateKey::EcdsaP521)
            .map_err(|_| Error::Malformed);
    }

    Err(Error::UnsupportedKeyFormat)
}

/// `PRIVATE KEY`: PKCS#8, dispatched on the algorithm identifier.
pub(crate) fn pkcs8(der: &[u8]) -> Result<PrivateKey> {
    let info = pkcs8::PrivateKeyInfo::try_from(der).map_err(|_| Error::Malformed)?;
    let oid = info.algorithm.oid;

    if oid == RSA_ENCRYPTION {
        rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map(PrivateKey::Rsa)
            .map_err(|_| Error::Malformed)
    } else if oid == EC_PUBLIC_KEY {
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|_| Error::Malformed)?;

        if curve == NISTP256 {
            p256::SecretKey::from_pkcs8_der(der)
                .map(|key| PrivateKey::EcdsaP256(key.into()))
                .map_err(|_| Error::Malformed)
        } else if curve == NISTP384 {
            p384::SecretKey::from_pkcs8_der(der)
                .map(|key| PrivateKey::EcdsaP384(key.into()))
                .map_err(|_| Error::Malformed)
        } else if curve == NISTP521 {
            p521::SecretKey::from_pkcs8_der(der)
                .map_err(|_| Error::Malformed)
                .and_then(|key| {
                    p521::ecdsa::SigningKey::from_bytes(&key.to_bytes())
                        .map(PrivateKey::EcdsaP521)
                        .map_err(|_| Error::Malformed)
                })
        } else {
            Err(Error::UnsupportedKeyFormat)
        }
    } else if oid == ED25519 {
        ed25519_dalek::SigningKey::from_pkcs8_der(der)
            .map(PrivateKey::Ed25519)
            .map_err(|_| Error::Malformed)
    } else {
        Err(Error::UnsupportedKeyFormat)
    }
}

/// `ENCRYPTED PRIVATE KEY`: PKCS#8 under PBES2, as emitted by
/// `openssl pkcs8 -topk8`.
pub(crate) fn pkcs8_encrypted(der: &[u8], passphrase: Option<&str>) -> Result<PrivateKey> {
    let Some(passphrase) = passphrase else {
        return Err(Error::EncryptedKeyNeedsPassphrase);
    };

    let encrypted =
        pkcs8::EncryptedPrivateKeyInfo::try_from(der).map_err(|_| Error::Malformed)?;

    // A wrong passphrase surfaces as an undecodable inner document.
    let document = encrypted
        .decrypt(passphrase)
        .map_err(|_| Error::BadPassphrase)?;

    pkcs8(document.as_bytes()).map_err(|err| match err {
        Error::Malformed => Error::BadPassphrase,
        other => other,
    })
}
