// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! RSA key material loading
//!
//! Keys are stored in the configuration as Base64 encoded PEM files, the same
//! form produced by the `rs256keygen` binary. Both PKCS#1 (`RSA PUBLIC KEY`,
//! `RSA PRIVATE KEY`) and PKCS#8 / SPKI (`PUBLIC KEY`, `PRIVATE KEY`) PEM
//! labels are accepted.

use base64::Engine;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

/// Decode the Base64 wrapper used in configuration files into PEM text
pub fn decode_base64_pem(encoded: &str) -> Result<String, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| format!("not valid base64: {}", e))?;
    String::from_utf8(bytes).map_err(|_| "decoded key is not UTF-8 PEM text".to_string())
}

/// Parse an RSA public key from PEM text
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, String> {
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| format!("invalid RSA public key: {}", e))
}

/// Parse an RSA private key from PEM text
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, String> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| format!("invalid RSA private key: {}", e))
}

/// A configured RSA key pair, either half of which may be absent.
///
/// A public-only pair can encrypt tokens for a recipient; a private key is
/// needed to decrypt. When only the private key is supplied the public half
/// is derived from it.
#[derive(Clone)]
pub struct RsaKeyPair {
    pub public_key: Option<RsaPublicKey>,
    pub private_key: Option<RsaPrivateKey>,
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaKeyPair")
            .field("public_key", &self.public_key.as_ref().map(|_| "<RsaPublicKey>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<RsaPrivateKey>"))
            .finish()
    }
}

impl RsaKeyPair {
    /// Build a key pair from the Base64 wrapped PEM strings of the configuration
    pub fn from_base64_pem(
        public_key: Option<&str>,
        private_key: Option<&str>,
    ) -> Result<Self, String> {
        let private_key = match private_key {
            Some(encoded) => Some(private_key_from_pem(&decode_base64_pem(encoded)?)?),
            None => None,
        };
        let public_key = match public_key {
            Some(encoded) => Some(public_key_from_pem(&decode_base64_pem(encoded)?)?),
            None => private_key.as_ref().map(RsaPublicKey::from),
        };
        if public_key.is_none() && private_key.is_none() {
            return Err("at least one of public_key or private_key is required".to_string());
        }
        Ok(Self {
            public_key,
            private_key,
        })
    }

    pub fn from_private_key(private_key: RsaPrivateKey) -> Self {
        Self {
            public_key: Some(RsaPublicKey::from(&private_key)),
            private_key: Some(private_key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
    use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey};

    fn encode(pem: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(pem.as_bytes())
    }

    #[test]
    fn test_load_pkcs1_and_pkcs8() {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public_key = RsaPublicKey::from(&private_key);

        let pkcs1_priv = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let pkcs1_pub = public_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let pair = RsaKeyPair::from_base64_pem(Some(&encode(&pkcs1_pub)), Some(&encode(&pkcs1_priv)))
            .unwrap();
        assert_eq!(pair.public_key, Some(public_key.clone()));

        let pkcs8_priv = private_key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap();
        let spki_pub = public_key.to_public_key_pem(rsa::pkcs8::LineEnding::LF).unwrap();
        let pair = RsaKeyPair::from_base64_pem(Some(&encode(&spki_pub)), Some(&encode(&pkcs8_priv)))
            .unwrap();
        assert!(pair.private_key.is_some());
    }

    #[test]
    fn test_public_key_derived_from_private() {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let pem = private_key.to_pkcs1_pem(rsa::pkcs1::LineEnding::LF).unwrap();
        let pair = RsaKeyPair::from_base64_pem(None, Some(&encode(&pem))).unwrap();
        assert_eq!(pair.public_key, Some(RsaPublicKey::from(&private_key)));
    }

    #[test]
    fn test_rejects_missing_and_garbage() {
        assert!(RsaKeyPair::from_base64_pem(None, None).is_err());
        assert!(RsaKeyPair::from_base64_pem(Some("%%%"), None).is_err());
        assert!(RsaKeyPair::from_base64_pem(Some(&encode("not a pem")), None).is_err());
    }
}
