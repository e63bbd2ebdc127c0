// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Token decoding
//!
//! Tokens returned by an identity provider come in three shapes, told apart
//! by their number of parts:
//!
//! | Parts | Shape | Handling |
//! |-------|-------|----------|
//! | 3 | signed (JWS) | verified with the provider signer |
//! | 5, `cty: JWT` | signed then encrypted | decrypted, then the inner JWS is verified |
//! | 5 | encrypted claims | decrypted; rejected when a signature is required |

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use super::encryption::{CompactJwe, EncryptionConfiguration};
use super::{ClaimsSet, JwtError, JwtSigner, KeyMaterialStore};

/// Where decryption keys come from
#[derive(Clone)]
pub enum DecryptionKeys {
    /// Encrypted tokens are refused
    None,
    /// A single named configuration
    Named(Arc<dyn EncryptionConfiguration>),
    /// Any configuration of the store that supports the token header
    MultiTenant(Arc<KeyMaterialStore>),
}

/// Decodes and verifies tokens for one consumer (typically one provider)
#[derive(Clone)]
pub struct TokenDecoder {
    keys: DecryptionKeys,
    signer: Option<Arc<JwtSigner>>,
    audience: Option<String>,
    require_signature: bool,
}

impl TokenDecoder {
    pub fn new(keys: DecryptionKeys, signer: Option<Arc<JwtSigner>>) -> Self {
        Self {
            keys,
            signer,
            audience: None,
            require_signature: true,
        }
    }

    /// Expected `aud` claim
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Accept encrypted claims that carry no signature
    pub fn allow_unsigned_encrypted(mut self, allow: bool) -> Self {
        self.require_signature = !allow;
        self
    }

    pub fn decode(&self, token: &str) -> Result<ClaimsSet, JwtError> {
        let token = token.trim();
        match token.split('.').count() {
            3 => self.verify_signed(token),
            5 => {
                let (jwe, payload) = self.decrypt(token)?;
                if jwe.header.is_nested() {
                    let inner = String::from_utf8(payload).map_err(|_| {
                        JwtError::MalformedToken("nested token is not UTF-8".into())
                    })?;
                    return self.verify_signed(&inner);
                }
                if self.require_signature {
                    return Err(JwtError::InvalidSignature(
                        "encrypted token carries no signature".into(),
                    ));
                }
                let claims = ClaimsSet::from_json_bytes(&payload)?;
                claims.check_expiration(Utc::now())?;
                self.check_audience(&claims)?;
                Ok(claims)
            }
            n => Err(JwtError::MalformedToken(format!(
                "expected 3 or 5 parts, found {}",
                n
            ))),
        }
    }

    fn decrypt(&self, token: &str) -> Result<(CompactJwe, Vec<u8>), JwtError> {
        match &self.keys {
            DecryptionKeys::None => Err(JwtError::UnsupportedAlgorithm(
                "encrypted tokens are not accepted".into(),
            )),
            DecryptionKeys::Named(config) => {
                let jwe = CompactJwe::parse(token)?;
                let payload = config.decrypt_payload(&jwe)?;
                Ok((jwe, payload))
            }
            DecryptionKeys::MultiTenant(store) => store.decrypt_any(token),
        }
    }

    fn verify_signed(&self, token: &str) -> Result<ClaimsSet, JwtError> {
        match &self.signer {
            Some(signer) => signer.verify(token, self.audience.as_deref()),
            None => Err(JwtError::UnsupportedAlgorithm(
                "signed tokens are not accepted".into(),
            )),
        }
    }

    fn check_audience(&self, claims: &ClaimsSet) -> Result<(), JwtError> {
        let Some(expected) = self.audience.as_deref() else {
            return Ok(());
        };
        let matches = match claims.get("aud") {
            None => true,
            Some(Value::String(aud)) => aud == expected,
            Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(expected)),
            Some(_) => false,
        };
        if matches {
            Ok(())
        } else {
            Err(JwtError::InvalidSignature("audience mismatch".into()))
        }
    }
}
