// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Content encryption
//!
//! Authenticated encryption of the token payload once the content
//! encryption key (CEK) has been chosen. Two families are supported:
//!
//! - AES-GCM (`A128GCM`, `A256GCM`)
//! - AES-CBC with an HMAC-SHA2 tag (`A128CBC-HS256`, `A256CBC-HS512`), where the
//!   CEK is split into a MAC key (first half) and an AES key (second half) and
//!   the tag covers `AAD || IV || ciphertext || AL`
//!
//! Every failure while opening a payload is reported as
//! [`JwtError::DecryptionFailed`], whatever the underlying cause.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Sha256, Sha512};

use super::{EncryptionMethod, JwtError};

/// Fill a fresh buffer from the thread-local CSPRNG
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf
}

/// Encrypt `plaintext` and return `(ciphertext, tag)`.
pub fn seal(
    method: EncryptionMethod,
    cek: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), JwtError> {
    if cek.len() != method.cek_len() || iv.len() != method.iv_len() {
        return Err(JwtError::Serialization(format!(
            "invalid key or IV length for {}",
            method
        )));
    }
    match method {
        EncryptionMethod::A128Gcm => gcm_seal::<Aes128Gcm>(cek, iv, plaintext, aad),
        EncryptionMethod::A256Gcm => gcm_seal::<Aes256Gcm>(cek, iv, plaintext, aad),
        EncryptionMethod::A128CbcHs256 | EncryptionMethod::A256CbcHs512 => {
            let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
            let ciphertext = match method {
                EncryptionMethod::A128CbcHs256 => {
                    cbc::Encryptor::<aes::Aes128>::new_from_slices(enc_key, iv)
                        .map_err(|e| JwtError::Serialization(e.to_string()))?
                        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
                }
                _ => cbc::Encryptor::<aes::Aes256>::new_from_slices(enc_key, iv)
                    .map_err(|e| JwtError::Serialization(e.to_string()))?
                    .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            };
            let tag = match method {
                EncryptionMethod::A128CbcHs256 => {
                    cbc_mac::<Hmac<Sha256>>(mac_key, aad, iv, &ciphertext)?
                        .finalize()
                        .into_bytes()
                        .to_vec()
                }
                _ => cbc_mac::<Hmac<Sha512>>(mac_key, aad, iv, &ciphertext)?
                    .finalize()
                    .into_bytes()
                    .to_vec(),
            };
            Ok((ciphertext, tag[..method.tag_len()].to_vec()))
        }
    }
}

/// Verify the tag and decrypt `ciphertext`.
pub fn open(
    method: EncryptionMethod,
    cek: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, JwtError> {
    if cek.len() != method.cek_len()
        || iv.len() != method.iv_len()
        || tag.len() != method.tag_len()
    {
        return Err(JwtError::DecryptionFailed);
    }
    match method {
        EncryptionMethod::A128Gcm => gcm_open::<Aes128Gcm>(cek, iv, ciphertext, tag, aad),
        EncryptionMethod::A256Gcm => gcm_open::<Aes256Gcm>(cek, iv, ciphertext, tag, aad),
        EncryptionMethod::A128CbcHs256 | EncryptionMethod::A256CbcHs512 => {
            let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
            // The MAC is checked before any padding is inspected
            let verified = match method {
                EncryptionMethod::A128CbcHs256 => {
                    cbc_mac::<Hmac<Sha256>>(mac_key, aad, iv, ciphertext)?
                        .verify_truncated_left(tag)
                }
                _ => cbc_mac::<Hmac<Sha512>>(mac_key, aad, iv, ciphertext)?
                    .verify_truncated_left(tag),
            };
            verified.map_err(|_| JwtError::DecryptionFailed)?;

            let plaintext = match method {
                EncryptionMethod::A128CbcHs256 => {
                    cbc::Decryptor::<aes::Aes128>::new_from_slices(enc_key, iv)
                        .map_err(|_| JwtError::DecryptionFailed)?
                        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                }
                _ => cbc::Decryptor::<aes::Aes256>::new_from_slices(enc_key, iv)
                    .map_err(|_| JwtError::DecryptionFailed)?
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext),
            };
            plaintext.map_err(|_| JwtError::DecryptionFailed)
        }
    }
}

fn gcm_seal<C: Aead + KeyInit>(
    cek: &[u8],
    iv: &[u8],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), JwtError> {
    let cipher = C::new_from_slice(cek).map_err(|e| JwtError::Serialization(e.to_string()))?;
    let mut sealed = cipher
        .encrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(iv),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| JwtError::Serialization("AES-GCM encryption failed".into()))?;
    // aes-gcm appends the tag to the ciphertext
    let tag = sealed.split_off(sealed.len() - 16);
    Ok((sealed, tag))
}

fn gcm_open<C: Aead + KeyInit>(
    cek: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, JwtError> {
    let cipher = C::new_from_slice(cek).map_err(|_| JwtError::DecryptionFailed)?;
    let mut combined = Vec::with_capacity(ciphertext.len() + tag.len());
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher
        .decrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(iv),
            Payload {
                msg: &combined,
                aad,
            },
        )
        .map_err(|_| JwtError::DecryptionFailed)
}

fn cbc_mac<M: Mac + KeyInit>(
    mac_key: &[u8],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<M, JwtError> {
    let mut mac = <M as Mac>::new_from_slice(mac_key).map_err(|_| JwtError::DecryptionFailed)?;
    let aad_bits = (aad.len() as u64) * 8;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&aad_bits.to_be_bytes());
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [EncryptionMethod; 4] = [
        EncryptionMethod::A128Gcm,
        EncryptionMethod::A256Gcm,
        EncryptionMethod::A128CbcHs256,
        EncryptionMethod::A256CbcHs512,
    ];

    #[test]
    fn test_seal_open_every_method() {
        for method in ALL {
            let cek = random_bytes(method.cek_len());
            let iv = random_bytes(method.iv_len());
            let (ct, tag) = seal(method, &cek, &iv, b"hello claims", b"header").unwrap();
            assert_eq!(tag.len(), method.tag_len(), "{}", method);
            let pt = open(method, &cek, &iv, &ct, &tag, b"header").unwrap();
            assert_eq!(pt, b"hello claims", "{}", method);
        }
    }

    #[test]
    fn test_aad_is_authenticated() {
        for method in ALL {
            let cek = random_bytes(method.cek_len());
            let iv = random_bytes(method.iv_len());
            let (ct, tag) = seal(method, &cek, &iv, b"payload", b"header-a").unwrap();
            assert!(
                matches!(
                    open(method, &cek, &iv, &ct, &tag, b"header-b"),
                    Err(JwtError::DecryptionFailed)
                ),
                "{}",
                method
            );
        }
    }

    #[test]
    fn test_rfc7518_cbc_hs256_vector() {
        // RFC 7518 Appendix B.1
        let cek: Vec<u8> = (0u8..32).collect();
        let iv = [
            0x1a, 0xf3, 0x8c, 0x2d, 0xc2, 0xb9, 0x6f, 0xfd, 0xd8, 0x66, 0x94, 0x09, 0x23, 0x41,
            0xbc, 0x04,
        ];
        let plaintext = b"A cipher system must not be required to be secret, and it must be able to fall into the hands of the enemy without inconvenience";
        let aad = b"The second principle of Auguste Kerckhoffs";
        let expected_tag = [
            0x65, 0x2c, 0x3f, 0xa3, 0x6b, 0x0a, 0x7c, 0x5b, 0x32, 0x19, 0xfa, 0xb3, 0xa3, 0x0b,
            0xc1, 0xc4,
        ];
        let (_, tag) = seal(EncryptionMethod::A128CbcHs256, &cek, &iv, plaintext, aad).unwrap();
        assert_eq!(tag, expected_tag);
    }

    #[test]
    fn test_wrong_tag_length_rejected() {
        let method = EncryptionMethod::A128CbcHs256;
        let cek = random_bytes(method.cek_len());
        let iv = random_bytes(method.iv_len());
        let (ct, tag) = seal(method, &cek, &iv, b"payload", b"aad").unwrap();
        assert!(matches!(
            open(method, &cek, &iv, &ct, &tag[..8], b"aad"),
            Err(JwtError::DecryptionFailed)
        ));
    }
}
