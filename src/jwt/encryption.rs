// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT encryption engine
//!
//! Produces and consumes JWE tokens in the five-part compact serialization:
//!
//! ```text
//! BASE64URL(header) . BASE64URL(encrypted key) . BASE64URL(iv) . BASE64URL(ciphertext) . BASE64URL(tag)
//! ```
//!
//! A fresh content encryption key and IV are drawn for every token, wrapped
//! with the recipient RSA public key, and the Base64URL header is used as the
//! additional authenticated data. Encrypting the same claims twice therefore
//! never yields the same token.
//!
//! ## Failure reporting
//!
//! - wrong number of parts, bad Base64URL or an unreadable header: [`JwtError::MalformedToken`]
//! - `alg`/`enc` not handled by the configuration: [`JwtError::UnsupportedAlgorithm`]
//! - key unwrap or tag verification failure: [`JwtError::DecryptionFailed`]
//!
//! When the RSA unwrap fails a random key of the right size is substituted so
//! that the failure only surfaces at tag verification, with the same error.

use log::trace;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use super::content;
use super::keys::RsaKeyPair;
use super::signing::JwtSigner;
use super::{b64_decode, b64_encode, ClaimsSet, EncryptionMethod, JweAlgorithm, JwtError};

/// Content type announcing a nested, signed JWT inside the encrypted payload
pub const NESTED_JWT_CONTENT_TYPE: &str = "JWT";

/// Protected header of a JWE
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JweHeader {
    pub alg: String,
    pub enc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cty: Option<String>,
}

impl JweHeader {
    pub fn algorithm(&self) -> Result<JweAlgorithm, JwtError> {
        self.alg.parse()
    }

    pub fn method(&self) -> Result<EncryptionMethod, JwtError> {
        self.enc.parse()
    }

    /// True when the payload is itself a compact JWS
    pub fn is_nested(&self) -> bool {
        self.cty
            .as_deref()
            .map(|cty| cty.eq_ignore_ascii_case(NESTED_JWT_CONTENT_TYPE))
            .unwrap_or(false)
    }
}

/// A parsed but not yet decrypted compact JWE
#[derive(Debug, Clone)]
pub struct CompactJwe {
    pub header: JweHeader,
    /// Base64URL form of the header, used verbatim as AAD
    pub protected: String,
    pub encrypted_key: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Vec<u8>,
}

impl CompactJwe {
    pub fn parse(token: &str) -> Result<Self, JwtError> {
        let parts: Vec<&str> = token.trim().split('.').collect();
        if parts.len() != 5 {
            return Err(JwtError::MalformedToken(format!(
                "expected 5 parts, found {}",
                parts.len()
            )));
        }
        let header_bytes = b64_decode(parts[0], "header")?;
        let header: JweHeader = serde_json::from_slice(&header_bytes)
            .map_err(|_| JwtError::MalformedToken("header is not a JWE header".into()))?;
        Ok(Self {
            header,
            protected: parts[0].to_string(),
            encrypted_key: b64_decode(parts[1], "encrypted key")?,
            iv: b64_decode(parts[2], "iv")?,
            ciphertext: b64_decode(parts[3], "ciphertext")?,
            tag: b64_decode(parts[4], "tag")?,
        })
    }
}

/// One named encryption setup, created once at startup.
///
/// This is the seam between the login flow and the key management
/// algorithm: the flow only ever talks to this trait.
pub trait EncryptionConfiguration: Send + Sync {
    /// Name of the key configuration, also written as `kid`
    fn name(&self) -> &str;

    fn supports(&self, algorithm: JweAlgorithm, method: EncryptionMethod) -> bool;

    /// True when a public key is available
    fn can_encrypt(&self) -> bool;

    /// True when a private key is available
    fn can_decrypt(&self) -> bool;

    /// Encrypt raw bytes, optionally announcing a content type
    fn encrypt_payload(&self, payload: &[u8], content_type: Option<&str>)
        -> Result<String, JwtError>;

    /// Decrypt an already parsed token and return the raw payload
    fn decrypt_payload(&self, jwe: &CompactJwe) -> Result<Vec<u8>, JwtError>;

    /// Encrypt a claims set as its canonical JSON serialization
    fn encrypt(&self, claims: &ClaimsSet) -> Result<String, JwtError> {
        self.encrypt_payload(&claims.to_json_bytes()?, None)
    }

    /// Sign the claims with `signer` and encrypt the resulting JWS
    fn encrypt_signed(&self, claims: &ClaimsSet, signer: &JwtSigner) -> Result<String, JwtError> {
        let jws = signer.sign(claims)?;
        self.encrypt_payload(jws.as_bytes(), Some(NESTED_JWT_CONTENT_TYPE))
    }

    /// Decrypt a token whose payload is a claims set
    fn decrypt(&self, token: &str) -> Result<ClaimsSet, JwtError> {
        let jwe = CompactJwe::parse(token)?;
        if jwe.header.is_nested() {
            return Err(JwtError::MalformedToken(
                "nested token requires signature verification".into(),
            ));
        }
        let payload = self.decrypt_payload(&jwe)?;
        ClaimsSet::from_json_bytes(&payload)
    }
}

/// RSA key wrapping with OAEP padding.
pub struct RsaEncryption {
    name: String,
    algorithm: JweAlgorithm,
    method: EncryptionMethod,
    keys: RsaKeyPair,
}

impl std::fmt::Debug for RsaEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaEncryption")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("method", &self.method)
            .field("keys", &self.keys)
            .finish()
    }
}

impl RsaEncryption {
    pub fn new(
        name: impl Into<String>,
        algorithm: JweAlgorithm,
        method: EncryptionMethod,
        keys: RsaKeyPair,
    ) -> Self {
        Self {
            name: name.into(),
            algorithm,
            method,
            keys,
        }
    }

    pub fn algorithm(&self) -> JweAlgorithm {
        self.algorithm
    }

    pub fn method(&self) -> EncryptionMethod {
        self.method
    }

    fn public_key(&self) -> Result<&RsaPublicKey, JwtError> {
        self.keys.public_key.as_ref().ok_or_else(|| JwtError::MissingKey {
            name: self.name.clone(),
            kind: "public",
        })
    }

    fn private_key(&self) -> Result<&RsaPrivateKey, JwtError> {
        self.keys.private_key.as_ref().ok_or_else(|| JwtError::MissingKey {
            name: self.name.clone(),
            kind: "private",
        })
    }

    fn padding(&self) -> Oaep {
        match self.algorithm {
            JweAlgorithm::RsaOaep => Oaep::new::<sha1::Sha1>(),
            JweAlgorithm::RsaOaep256 => Oaep::new::<sha2::Sha256>(),
        }
    }
}

impl EncryptionConfiguration for RsaEncryption {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, algorithm: JweAlgorithm, method: EncryptionMethod) -> bool {
        self.algorithm == algorithm && self.method == method
    }

    fn can_encrypt(&self) -> bool {
        self.keys.public_key.is_some()
    }

    fn can_decrypt(&self) -> bool {
        self.keys.private_key.is_some()
    }

    fn encrypt_payload(
        &self,
        payload: &[u8],
        content_type: Option<&str>,
    ) -> Result<String, JwtError> {
        let public_key = self.public_key()?;

        let header = JweHeader {
            alg: self.algorithm.to_string(),
            enc: self.method.to_string(),
            kid: Some(self.name.clone()),
            typ: Some("JWT".to_string()),
            cty: content_type.map(str::to_string),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| JwtError::Serialization(e.to_string()))?;
        let protected = b64_encode(&header_json);

        let cek = content::random_bytes(self.method.cek_len());
        let iv = content::random_bytes(self.method.iv_len());

        let mut rng = rsa::rand_core::OsRng;
        let encrypted_key = public_key
            .encrypt(&mut rng, self.padding(), &cek)
            .map_err(|e| JwtError::Serialization(format!("key wrapping failed: {}", e)))?;

        let (ciphertext, tag) =
            content::seal(self.method, &cek, &iv, payload, protected.as_bytes())?;

        Ok(format!(
            "{}.{}.{}.{}.{}",
            protected,
            b64_encode(&encrypted_key),
            b64_encode(&iv),
            b64_encode(&ciphertext),
            b64_encode(&tag)
        ))
    }

    fn decrypt_payload(&self, jwe: &CompactJwe) -> Result<Vec<u8>, JwtError> {
        let algorithm = jwe.header.algorithm()?;
        let method = jwe.header.method()?;
        if !self.supports(algorithm, method) {
            return Err(JwtError::UnsupportedAlgorithm(format!(
                "{}/{} is not handled by '{}'",
                algorithm, method, self.name
            )));
        }
        let private_key = self.private_key()?;

        let cek = match private_key.decrypt(self.padding(), &jwe.encrypted_key) {
            Ok(cek) if cek.len() == method.cek_len() => cek,
            _ => {
                trace!("Key unwrap failed for '{}'", self.name);
                content::random_bytes(method.cek_len())
            }
        };

        content::open(
            method,
            &cek,
            &jwe.iv,
            &jwe.ciphertext,
            &jwe.tag,
            jwe.protected.as_bytes(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn test_keys() -> RsaKeyPair {
        let mut rng = rsa::rand_core::OsRng;
        RsaKeyPair::from_private_key(RsaPrivateKey::new(&mut rng, 2048).unwrap())
    }

    fn sample_claims() -> ClaimsSet {
        ClaimsSet::new()
            .with("sub", "alice")
            .with("email", "alice@example.com")
            .with("roles", serde_json::json!(["admin", "user"]))
    }

    #[test]
    fn test_round_trip_every_combination() {
        let keys = test_keys();
        for algorithm in [JweAlgorithm::RsaOaep, JweAlgorithm::RsaOaep256] {
            for method in [
                EncryptionMethod::A128Gcm,
                EncryptionMethod::A256Gcm,
                EncryptionMethod::A128CbcHs256,
                EncryptionMethod::A256CbcHs512,
            ] {
                let config = RsaEncryption::new("k1", algorithm, method, keys.clone());
                let token = config.encrypt(&sample_claims()).unwrap();
                assert_eq!(token.split('.').count(), 5);
                let claims = config.decrypt(&token).unwrap();
                assert_eq!(claims, sample_claims(), "{}/{}", algorithm, method);
            }
        }
    }

    #[test]
    fn test_encryption_is_randomized() {
        let config = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            test_keys(),
        );
        let first = config.encrypt(&sample_claims()).unwrap();
        let second = config.encrypt(&sample_claims()).unwrap();
        assert_ne!(first, second);
        let first_parts: Vec<&str> = first.split('.').collect();
        let second_parts: Vec<&str> = second.split('.').collect();
        assert_ne!(first_parts[1], second_parts[1]);
        assert_ne!(first_parts[2], second_parts[2]);
        assert_ne!(first_parts[3], second_parts[3]);
    }

    #[test]
    fn test_header_names_key_and_algorithms() {
        let config = RsaEncryption::new(
            "tenant-a",
            JweAlgorithm::RsaOaep,
            EncryptionMethod::A256Gcm,
            test_keys(),
        );
        let token = config.encrypt(&sample_claims()).unwrap();
        let jwe = CompactJwe::parse(&token).unwrap();
        assert_eq!(jwe.header.alg, "RSA-OAEP");
        assert_eq!(jwe.header.enc, "A256GCM");
        assert_eq!(jwe.header.kid.as_deref(), Some("tenant-a"));
        assert!(!jwe.header.is_nested());
    }

    #[test]
    fn test_mismatched_configuration_is_unsupported() {
        let keys = test_keys();
        let issuer = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128CbcHs256,
            keys.clone(),
        );
        let other_method = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            keys.clone(),
        );
        let other_alg = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep,
            EncryptionMethod::A128CbcHs256,
            keys,
        );
        let token = issuer.encrypt(&sample_claims()).unwrap();
        assert!(matches!(
            other_method.decrypt(&token),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            other_alg.decrypt(&token),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let config = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            test_keys(),
        );
        let token = config.encrypt(&sample_claims()).unwrap();
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let mut ciphertext = b64_decode(&parts[3], "ciphertext").unwrap();
        ciphertext[0] ^= 0x01;
        parts[3] = b64_encode(&ciphertext);
        let tampered = parts.join(".");
        assert!(matches!(
            config.decrypt(&tampered),
            Err(JwtError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_wrong_private_key_fails_decryption() {
        let sender = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A256CbcHs512,
            test_keys(),
        );
        let stranger = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A256CbcHs512,
            test_keys(),
        );
        let token = sender.encrypt(&sample_claims()).unwrap();
        assert!(matches!(
            stranger.decrypt(&token),
            Err(JwtError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let config = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            test_keys(),
        );
        assert!(matches!(
            config.decrypt("a.b.c"),
            Err(JwtError::MalformedToken(_))
        ));
        assert!(matches!(
            config.decrypt("a.b.c.d.e.f"),
            Err(JwtError::MalformedToken(_))
        ));
        assert!(matches!(
            config.decrypt("!!.b.c.d.e"),
            Err(JwtError::MalformedToken(_))
        ));
        let not_a_header = b64_encode(b"[]");
        assert!(matches!(
            config.decrypt(&format!("{}.AA.AA.AA.AA", not_a_header)),
            Err(JwtError::MalformedToken(_))
        ));
    }

    #[test]
    fn test_public_only_configuration() {
        let keys = test_keys();
        let public_only = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            RsaKeyPair {
                public_key: keys.public_key.clone(),
                private_key: None,
            },
        );
        assert!(!public_only.can_decrypt());
        let token = public_only.encrypt(&sample_claims()).unwrap();
        assert!(matches!(
            public_only.decrypt(&token),
            Err(JwtError::MissingKey { kind: "private", .. })
        ));

        let full = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            keys,
        );
        assert_eq!(full.decrypt(&token).unwrap(), sample_claims());
    }

    #[test]
    fn test_missing_public_key_cannot_encrypt() {
        let keys = test_keys();
        let private_only = RsaEncryption::new(
            "k1",
            JweAlgorithm::RsaOaep256,
            EncryptionMethod::A128Gcm,
            RsaKeyPair {
                public_key: None,
                private_key: keys.private_key,
            },
        );
        assert!(!private_only.can_encrypt());
        assert!(private_only.can_decrypt());
        assert!(matches!(
            private_only.encrypt(&sample_claims()),
            Err(JwtError::MissingKey { kind: "public", .. })
        ));
    }
}
