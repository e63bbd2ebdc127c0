// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT signing engine
//!
//! Signs and verifies compact JWS tokens with `jsonwebtoken`. A signer is
//! configured with either a shared secret (HMAC) or RSA keys; an RSA signer
//! built from a public key alone can only verify.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::{ClaimsSet, JwtError};

/// A named signing configuration
pub struct JwtSigner {
    name: String,
    algorithm: Algorithm,
    encoding_key: Option<EncodingKey>,
    decoding_key: Option<DecodingKey>,
    issuer: Option<String>,
}

impl std::fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSigner")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("encoding_key", &self.encoding_key.as_ref().map(|_| "<EncodingKey>"))
            .field("decoding_key", &self.decoding_key.as_ref().map(|_| "<DecodingKey>"))
            .field("issuer", &self.issuer)
            .finish()
    }
}

impl JwtSigner {
    /// Create a signer with a symmetric key (HMAC)
    pub fn new_symmetric(
        name: impl Into<String>,
        secret: &[u8],
        algorithm: Algorithm,
    ) -> Result<Self, JwtError> {
        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => (),
            _ => {
                return Err(JwtError::UnsupportedAlgorithm(format!(
                    "{:?} is not valid for symmetric keys",
                    algorithm
                )))
            }
        }
        Ok(Self {
            name: name.into(),
            algorithm,
            encoding_key: Some(EncodingKey::from_secret(secret)),
            decoding_key: Some(DecodingKey::from_secret(secret)),
            issuer: None,
        })
    }

    /// Create a signer with RSA keys from PEM bytes. Either key may be absent.
    pub fn new_rsa(
        name: impl Into<String>,
        algorithm: Algorithm,
        private_key_pem: Option<&[u8]>,
        public_key_pem: Option<&[u8]>,
    ) -> Result<Self, JwtError> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => (),
            _ => {
                return Err(JwtError::UnsupportedAlgorithm(format!(
                    "{:?} is not valid for RSA keys",
                    algorithm
                )))
            }
        }
        let encoding_key = private_key_pem
            .map(EncodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| JwtError::Serialization(format!("invalid RSA private key: {}", e)))?;
        let decoding_key = public_key_pem
            .map(DecodingKey::from_rsa_pem)
            .transpose()
            .map_err(|e| JwtError::Serialization(format!("invalid RSA public key: {}", e)))?;
        if encoding_key.is_none() && decoding_key.is_none() {
            return Err(JwtError::MissingKey {
                name: name.into(),
                kind: "signing or verification",
            });
        }
        Ok(Self {
            name: name.into(),
            algorithm,
            encoding_key,
            decoding_key,
            issuer: None,
        })
    }

    /// Require (and stamp) this issuer
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// True when a signing key is available, not just a verification key
    pub fn can_sign(&self) -> bool {
        self.encoding_key.is_some()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// Sign the claims into a compact JWS.
    ///
    /// The configured issuer is added when the claims carry none.
    pub fn sign(&self, claims: &ClaimsSet) -> Result<String, JwtError> {
        let key = self.encoding_key.as_ref().ok_or_else(|| JwtError::MissingKey {
            name: self.name.clone(),
            kind: "signing",
        })?;
        let mut header = Header::new(self.algorithm);
        header.kid = Some(self.name.clone());

        let stamped;
        let claims = match (&self.issuer, claims.issuer()) {
            (Some(issuer), None) => {
                stamped = claims.clone().with("iss", issuer.clone());
                &stamped
            }
            _ => claims,
        };
        encode(&header, claims, key).map_err(|e| JwtError::Serialization(e.to_string()))
    }

    /// Verify a compact JWS and return its claims.
    ///
    /// `exp` is required and enforced. `aud` is checked only when `audience`
    /// is given, `iss` only when the signer has an issuer.
    pub fn verify(&self, token: &str, audience: Option<&str>) -> Result<ClaimsSet, JwtError> {
        let key = self.decoding_key.as_ref().ok_or_else(|| JwtError::MissingKey {
            name: self.name.clone(),
            kind: "verification",
        })?;
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if let Some(ref issuer) = self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<ClaimsSet>(token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                    JwtError::UnsupportedAlgorithm(e.to_string())
                }
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => JwtError::MalformedToken(e.to_string()),
                _ => JwtError::InvalidSignature(e.to_string()),
            })
    }
}
