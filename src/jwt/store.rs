// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Key material store
//!
//! Registry of named encryption configurations and signers. It is filled
//! once while the server starts and then shared read-only behind an `Arc`,
//! so lookups take no lock.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};
use thiserror::Error;

use super::encryption::{CompactJwe, EncryptionConfiguration};
use super::{JwtError, JwtSigner};

/// Startup-time configuration failures. These are fatal.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Key configuration '{0}' is already registered")]
    DuplicateKeyName(String),

    #[error("Key configuration '{0}' not found")]
    NotFound(String),

    #[error("Invalid key material for '{name}': {reason}")]
    InvalidKey { name: String, reason: String },

    #[error("Provider '{provider}' references unknown {kind} configuration '{name}'")]
    UnknownReference {
        provider: String,
        kind: &'static str,
        name: String,
    },

    #[error("Provider '{0}' is configured more than once")]
    DuplicateProvider(String),

    #[error("Invalid provider '{name}': {reason}")]
    InvalidProvider { name: String, reason: String },

    #[error("Invalid setting '{setting}': {reason}")]
    InvalidSetting { setting: &'static str, reason: String },
}

/// Named key configurations available to the login flow
#[derive(Default)]
pub struct KeyMaterialStore {
    encryption: HashMap<String, Arc<dyn EncryptionConfiguration>>,
    signers: HashMap<String, Arc<JwtSigner>>,
}

impl KeyMaterialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encryption configuration under its own name
    pub fn register(
        &mut self,
        config: Arc<dyn EncryptionConfiguration>,
    ) -> Result<(), ConfigurationError> {
        let name = config.name().to_string();
        if self.encryption.contains_key(&name) {
            return Err(ConfigurationError::DuplicateKeyName(name));
        }
        debug!("Registered encryption configuration '{}'", name);
        self.encryption.insert(name, config);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<dyn EncryptionConfiguration>, ConfigurationError> {
        self.encryption
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::NotFound(name.to_string()))
    }

    /// Register a signer under its own name
    pub fn register_signer(&mut self, signer: JwtSigner) -> Result<(), ConfigurationError> {
        let name = signer.name().to_string();
        if self.signers.contains_key(&name) {
            return Err(ConfigurationError::DuplicateKeyName(name));
        }
        debug!("Registered signature configuration '{}'", name);
        self.signers.insert(name, Arc::new(signer));
        Ok(())
    }

    pub fn signer(&self, name: &str) -> Result<Arc<JwtSigner>, ConfigurationError> {
        self.signers
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::NotFound(name.to_string()))
    }

    /// Decrypt with whichever configuration handles the token.
    ///
    /// Only for multi-tenant setups. A `kid` naming a registered
    /// configuration pins the attempt to it. Otherwise every configuration
    /// that supports the header's `alg`/`enc` and holds a private key is
    /// tried; the others are skipped, never coerced.
    pub fn decrypt_any(&self, token: &str) -> Result<(CompactJwe, Vec<u8>), JwtError> {
        let jwe = CompactJwe::parse(token)?;
        let algorithm = jwe.header.algorithm()?;
        let method = jwe.header.method()?;

        if let Some(config) = jwe.header.kid.as_deref().and_then(|kid| self.encryption.get(kid)) {
            let payload = config.decrypt_payload(&jwe)?;
            return Ok((jwe, payload));
        }

        let mut candidates = self
            .encryption
            .values()
            .filter(|config| config.can_decrypt() && config.supports(algorithm, method))
            .peekable();
        if candidates.peek().is_none() {
            return Err(JwtError::UnsupportedAlgorithm(format!(
                "no configuration handles {}/{}",
                algorithm, method
            )));
        }
        for config in candidates {
            match config.decrypt_payload(&jwe) {
                Ok(payload) => return Ok((jwe, payload)),
                Err(_) => trace!("Configuration '{}' could not open token", config.name()),
            }
        }
        Err(JwtError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::keys::RsaKeyPair;
    use crate::jwt::{ClaimsSet, EncryptionMethod, JweAlgorithm, RsaEncryption};
    use jsonwebtoken::Algorithm;

    fn rsa_config(name: &str, method: EncryptionMethod) -> Arc<RsaEncryption> {
        let mut rng = rsa::rand_core::OsRng;
        let key = rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap();
        Arc::new(RsaEncryption::new(
            name,
            JweAlgorithm::RsaOaep256,
            method,
            RsaKeyPair::from_private_key(key),
        ))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut store = KeyMaterialStore::new();
        store
            .register(rsa_config("primary", EncryptionMethod::A128Gcm))
            .unwrap();
        assert_eq!(store.lookup("primary").unwrap().name(), "primary");
        assert!(matches!(
            store.lookup("missing"),
            Err(ConfigurationError::NotFound(_))
        ));
        assert!(matches!(
            store.register(rsa_config("primary", EncryptionMethod::A256Gcm)),
            Err(ConfigurationError::DuplicateKeyName(_))
        ));
    }

    #[test]
    fn test_signers_are_separate_namespace() {
        let mut store = KeyMaterialStore::new();
        store
            .register_signer(JwtSigner::new_symmetric("session", b"secret", Algorithm::HS256).unwrap())
            .unwrap();
        assert!(store.signer("session").is_ok());
        assert!(store.lookup("session").is_err());
        assert!(matches!(
            store.register_signer(
                JwtSigner::new_symmetric("session", b"other", Algorithm::HS256).unwrap()
            ),
            Err(ConfigurationError::DuplicateKeyName(_))
        ));
    }

    #[test]
    fn test_decrypt_any_skips_unsupported_configurations() {
        let gcm = rsa_config("tenant-gcm", EncryptionMethod::A128Gcm);
        let cbc = rsa_config("tenant-cbc", EncryptionMethod::A128CbcHs256);
        let mut store = KeyMaterialStore::new();
        store.register(gcm.clone()).unwrap();
        store.register(cbc.clone()).unwrap();

        let claims = ClaimsSet::new().with("sub", "bob");
        let token = cbc.encrypt(&claims).unwrap();
        let (_, payload) = store.decrypt_any(&token).unwrap();
        assert_eq!(ClaimsSet::from_json_bytes(&payload).unwrap(), claims);

        let lone = rsa_config("elsewhere", EncryptionMethod::A256CbcHs512);
        let foreign = lone.encrypt(&claims).unwrap();
        assert!(matches!(
            store.decrypt_any(&foreign),
            Err(JwtError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_decrypt_any_without_matching_key_fails() {
        let mut store = KeyMaterialStore::new();
        store
            .register(rsa_config("tenant-a", EncryptionMethod::A128Gcm))
            .unwrap();
        let outsider = rsa_config("outsider", EncryptionMethod::A128Gcm);
        let token = outsider.encrypt(&ClaimsSet::new().with("sub", "eve")).unwrap();
        assert!(matches!(
            store.decrypt_any(&token),
            Err(JwtError::DecryptionFailed)
        ));
    }
}
