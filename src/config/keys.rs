// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Key material configuration
//!
//! The `signatures` and `encryption` sections declare named keys. They are
//! turned into a [`KeyMaterialStore`] once at startup; any invalid or
//! duplicate entry is a fatal [`ConfigurationError`].
//!
//! RSA keys are Base64-encoded PEM files, as printed by `rs256keygen`.

use std::sync::Arc;

use jsonwebtoken::Algorithm;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::jwt::keys::{decode_base64_pem, RsaKeyPair};
use crate::jwt::{ConfigurationError, EncryptionMethod, JweAlgorithm, JwtSigner, KeyMaterialStore, RsaEncryption};

/// A named JWS key
#[derive(Clone, Serialize, Deserialize)]
pub struct SignatureKeyConfig {
    pub name: String,

    /// `HS256`, `HS384`, `HS512`, `RS*` or `PS*`. Default is `HS256`.
    #[serde(default = "default_signature_algorithm")]
    pub algorithm: Algorithm,

    /// Shared secret of HMAC algorithms
    #[serde(default)]
    pub secret: Option<String>,

    /// RSA private key (signing), Base64-encoded PEM
    #[serde(default)]
    pub private_key: Option<String>,

    /// RSA public key (verification), Base64-encoded PEM
    #[serde(default)]
    pub public_key: Option<String>,

    /// Expected and stamped `iss` claim
    #[serde(default)]
    pub issuer: Option<String>,
}

fn default_signature_algorithm() -> Algorithm {
    Algorithm::HS256
}

impl std::fmt::Debug for SignatureKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureKeyConfig")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("public_key", &self.public_key.is_some())
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl SignatureKeyConfig {
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        )
    }

    pub fn to_signer(&self) -> Result<JwtSigner, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidKey {
            name: self.name.clone(),
            reason,
        };

        let signer = if self.is_symmetric() {
            let secret = self
                .secret
                .as_deref()
                .filter(|secret| !secret.is_empty())
                .ok_or_else(|| invalid("HMAC algorithms need a secret".to_string()))?;
            JwtSigner::new_symmetric(&self.name, secret.as_bytes(), self.algorithm)
        } else {
            let private_pem = self
                .private_key
                .as_deref()
                .map(decode_base64_pem)
                .transpose()
                .map_err(&invalid)?;
            let public_pem = self
                .public_key
                .as_deref()
                .map(decode_base64_pem)
                .transpose()
                .map_err(&invalid)?;
            JwtSigner::new_rsa(
                &self.name,
                self.algorithm,
                private_pem.as_deref().map(str::as_bytes),
                public_pem.as_deref().map(str::as_bytes),
            )
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(match &self.issuer {
            Some(issuer) => signer.with_issuer(issuer),
            None => signer,
        })
    }
}

/// A named RSA key pair for JWE
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptionKeyConfig {
    pub name: String,

    #[serde(default)]
    pub algorithm: JweAlgorithm,

    #[serde(default)]
    pub method: EncryptionMethod,

    /// Needed to encrypt tokens for this recipient
    #[serde(default)]
    pub public_key: Option<String>,

    /// Needed to decrypt tokens sent to this recipient
    #[serde(default)]
    pub private_key: Option<String>,
}

impl std::fmt::Debug for EncryptionKeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyConfig")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("method", &self.method)
            .field("public_key", &self.public_key.is_some())
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl EncryptionKeyConfig {
    pub fn to_encryption(&self) -> Result<RsaEncryption, ConfigurationError> {
        let keys = RsaKeyPair::from_base64_pem(self.public_key.as_deref(), self.private_key.as_deref())
            .map_err(|reason| ConfigurationError::InvalidKey {
                name: self.name.clone(),
                reason,
            })?;
        Ok(RsaEncryption::new(&self.name, self.algorithm, self.method, keys))
    }
}

/// Build the key store from the `signatures` and `encryption` sections
pub fn build_key_store(
    signatures: &[SignatureKeyConfig],
    encryption: &[EncryptionKeyConfig],
) -> Result<KeyMaterialStore, ConfigurationError> {
    let mut store = KeyMaterialStore::new();
    for entry in signatures {
        store.register_signer(entry.to_signer()?)?;
    }
    for entry in encryption {
        store.register(Arc::new(entry.to_encryption()?))?;
    }
    debug!(
        "Key store ready with {} signature and {} encryption configurations",
        signatures.len(),
        encryption.len()
    );
    Ok(store)
}
