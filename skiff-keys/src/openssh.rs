//! Decoding of the `openssh-key-v1` container, with its `bcrypt`
//! KDF and `aes256-ctr`/`aes256-cbc` encryption.

use cipher::{BlockDecryptMut, KeyIvInit, StreamCipher};
use rsa::BigUint;
use zeroize::Zeroize;

use skiff::wire::Reader;

use crate::{left_pad, Error, PrivateKey, Result};

const MAGIC: &[u8] = b"openssh-key-v1\0";

/// The cipher block the private section is padded to, and the key +
/// IV material the KDF must produce for the supported ciphers.
const BLOCK: usize = 16;
const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;

pub(crate) fn decode(blob: &[u8], passphrase: Option<&str>) -> Result<PrivateKey> {
    let Some(rest) = blob.strip_prefix(MAGIC) else {
        return Err(Error::Malformed);
    };

    let mut reader = Reader::new(rest);

    let cipher = reader.utf8()?.to_owned();
    let kdf = reader.utf8()?.to_owned();
    let kdfoptions = reader.string()?.to_owned();

    if reader.u32()? != 1 {
        // Multi-key containers are exotic enough to refuse.
        return Err(Error::UnsupportedKeyFormat);
    }

    let _public = reader.string()?;
    let mut private = reader.string()?.to_vec();

    let encrypted = cipher != "none";
    if encrypted {
        let Some(passphrase) = passphrase else {
            return Err(Error::EncryptedKeyNeedsPassphrase);
        };
        if kdf != "bcrypt" {
            return Err(Error::UnsupportedKeyFormat);
        }

        let mut options = Reader::new(&kdfoptions);
        let salt = options.string()?;
        let rounds = options.u32()?;

        let mut material = [0u8; KEY_SIZE + IV_SIZE];
        bcrypt_pbkdf::bcrypt_pbkdf(passphrase, salt, rounds, &mut material)
            .map_err(|_| Error::Malformed)?;
        let (key, iv) = material.split_at(KEY_SIZE);

        match cipher.as_str() {
            "aes256-ctr" => {
                let mut cipher = ctr::Ctr128BE::<aes::Aes256>::new_from_slices(key, iv)
                    .map_err(|_| Error::Malformed)?;

                cipher.apply_keystream(&mut private);
            }
            "aes256-cbc" => {
                if private.len() % BLOCK != 0 {
                    return Err(Error::Malformed);
                }

                let cipher = cbc::Decryptor::<aes::Aes256>::new_from_slices(key, iv)
                    .map_err(|_| Error::Malformed)?;

                cipher
                    .decrypt_padded_mut::<cipher::block_padding::NoPadding>(&mut private)
                    .map_err(|_| Error::BadPassphrase)?;
            }
            _ => return Err(Error::UnsupportedKeyFormat),
        }

        material.zeroize();
    }

    let key = private_section(&private).map_err(|err| match err {
        // Garbage out of the cipher means the passphrase was wrong.
        Error::Malformed if encrypted => Error::BadPassphrase,
        other => other,
    });

    private.zeroize();

    key
}

/// The decrypted private section: the check-int pair, one key, a
/// comment, and the deterministic `1, 2, 3, …` trailing pad.
fn private_section(block: &[u8]) -> Result<PrivateKey> {
    let mut reader = Reader::new(block);

    let check1 = reader.u32()?;
    let check2 = reader.u32()?;
    if check1 != check2 {
        return Err(Error::Malformed);
    }

    let key = match reader.utf8()? {
        "ssh-ed25519" => {
            let _pk = reader.string()?;

            let sk = reader.string()?;
            if sk.len() != 64 {
                return Err(Error::Malformed);
            }
            let seed: [u8; 32] = sk[..32].try_into().map_err(|_| Error::Malformed)?;

            PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
        }
        "ssh-rsa" => {
            let n = BigUint::from_bytes_be(reader.mpint()?);
            let e = BigUint::from_bytes_be(reader.mpint()?);
            let d = BigUint::from_bytes_be(reader.mpint()?);
            let _iqmp = reader.mpint()?;
            let p = BigUint::from_bytes_be(reader.mpint()?);
            let q = BigUint::from_bytes_be(reader.mpint()?);

            PrivateKey::Rsa(
                rsa::RsaPrivateKey::from_components(n, e, d, vec![p, q])
                    .map_err(|_| Error::Malformed)?,
            )
        }
        "ecdsa-sha2-nistp256" => {
            let _curve = reader.string()?;
            let _q = reader.string()?;
            let scalar = left_pad::<32>(reader.mpint()?)?;

            PrivateKey::EcdsaP256(
                p256::ecdsa::SigningKey::from_slice(&scalar).map_err(|_| Error::Malformed)?,
            )
        }
        "ecdsa-sha2-nistp384" => {
            let _curve = reader.string()?;
            let _q = reader.string()?;
            let scalar = left_pad::<48>(reader.mpint()?)?;

            PrivateKey::EcdsaP384(
                p384::ecdsa::SigningKey::from_slice(&scalar).map_err(|_| Error::Malformed)?,
            )
        }
        "ecdsa-sha2-nistp521" => {
            let _curve = reader.string()?;
            let _q = reader.string()?;
            let scalar = left_pad::<66>(reader.mpint()?)?;

            PrivateKey::EcdsaP521(
                p521::ecdsa::SigningKey::from_slice(&scalar).map_err(|_| Error::Malformed)?,
            )
        }
        _ => return Err(Error::UnsupportedKeyFormat),
    };

    let _comment = reader.string()?;

    for (index, byte) in reader.remaining().iter().enumerate() {
        if *byte != (index + 1) as u8 {
            return Err(Error::Malformed);
        }
    }

    Ok(key)
}

#[cfg(test)]
pub(crate) mod encode {
    //! Container construction, test-side only: the decoder above is
    //! exercised against blobs we assemble with the same primitives
    //! OpenSSH uses.

    use cipher::{KeyIvInit, StreamCipher};

    use skiff::wire::Writer;

    use super::{BLOCK, IV_SIZE, KEY_SIZE, MAGIC};

    pub(crate) fn ed25519(
        key: &ed25519_dalek::SigningKey,
        cipher: &str,
        passphrase: Option<&str>,
        rounds: u32,
    ) -> Vec<u8> {
        let public = {
            let mut writer = Writer::new();
            writer.string(b"ssh-ed25519");
            writer.string(&key.verifying_key().to_bytes());
            writer.finish()
        };

        let mut section = Writer::new();
        section.u32(0x0badc0de);
        section.u32(0x0badc0de);
        section.string(b"ssh-ed25519");
        section.string(&key.verifying_key().to_bytes());
        let mut sk = [0u8; 64];
        sk[..32].copy_from_slice(&key.to_bytes());
        sk[32..].copy_from_slice(&key.verifying_key().to_bytes());
        section.string(&sk);
        section.string(b"test@skiff");

        let mut section = section.finish();
        let mut pad = 1u8;
        while section.len() % BLOCK != 0 {
            section.push(pad);
            pad = pad.wrapping_add(1);
        }

        let salt = [0x5a; 16];
        let kdfoptions = match passphrase {
            Some(passphrase) => {
                let mut material = [0u8; KEY_SIZE + IV_SIZE];
                bcrypt_pbkdf::bcrypt_pbkdf(passphrase, &salt, rounds, &mut material)
                    .expect("bcrypt parameters are fixed");
                let (key, iv) = material.split_at(KEY_SIZE);

                match cipher {
                    "aes256-ctr" => {
                        let mut cipher = ctr::Ctr128BE::<aes::Aes256>::new_from_slices(key, iv)
                            .expect("derived sizes are fixed");
                        cipher.apply_keystream(&mut section);
                    }
                    other => panic!("unsupported test cipher {other}"),
                }

                let mut writer = Writer::new();
                writer.string(&salt);
                writer.u32(rounds);
                writer.finish()
            }
            None => Vec::new(),
        };

        let mut container = Writer::new();
        container.raw(MAGIC);
        container.string(if passphrase.is_some() {
            cipher.as_bytes()
        } else {
            b"none"
        });
        container.string(if passphrase.is_some() {
            b"bcrypt"
        } else {
            b"none"
        });
        container.string(&kdfoptions);
        container.u32(1);
        container.string(&public);
        container.string(&section);

        container.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use signature::Verifier;

    fn armor(blob: &[u8]) -> String {
        pem::encode(&pem::Pem::new("OPENSSH PRIVATE KEY", blob))
    }

    fn generated() -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::from_bytes(&[0x17; 32])
    }

    #[test]
    fn plain_container_roundtrips() {
        let key = generated();
        let pem = armor(&encode::ed25519(&key, "none", None, 0));

        let decoded = PrivateKey::decode(pem.as_bytes(), None).expect("decode");

        assert_eq!(decoded.public_blob(), PrivateKey::from(key).public_blob());
    }

    #[test]
    fn encrypted_container_needs_its_passphrase() {
        let pem = armor(&encode::ed25519(
            &generated(),
            "aes256-ctr",
            Some("test123"),
            8,
        ));

        assert!(matches!(
            PrivateKey::decode(pem.as_bytes(), None),
            Err(Error::EncryptedKeyNeedsPassphrase)
        ));
        assert!(matches!(
            PrivateKey::decode(pem.as_bytes(), Some("wrong")),
            Err(Error::BadPassphrase)
        ));

        let decoded = PrivateKey::decode(pem.as_bytes(), Some("test123")).expect("decode");

        // `ssh-ed25519` tag, length-prefixed, then the 32-byte key.
        let blob = decoded.public_blob();
        assert_eq!(&blob[..15], b"\x00\x00\x00\x0bssh-ed25519");
        assert_eq!(blob.len(), 15 + 4 + 32);
    }

    #[test]
    fn signatures_verify_after_decode() {
        let key = generated();
        let pem = armor(&encode::ed25519(&key, "aes256-ctr", Some("hunter2"), 8));

        let decoded = PrivateKey::decode(pem.as_bytes(), Some("hunter2")).expect("decode");
        let signature = decoded.sign("ssh-ed25519", b"payload").expect("sign");

        let signature = ed25519_dalek::Signature::from_slice(&signature).expect("signature");
        key.verifying_key()
            .verify(b"payload", &signature)
            .expect("verification");
    }

    #[test]
    fn wrong_algorithm_is_a_mismatch() {
        let decoded = PrivateKey::from(generated());

        assert!(matches!(
            decoded.sign("rsa-sha2-256", b"payload"),
            Err(Error::AlgorithmKeyMismatch)
        ));
    }
}
