// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON Web Token support
//!
//! This module groups everything needed to issue and consume tokens:
//!
//! - [`algorithms`]: JWE `alg`/`enc` identifiers
//! - [`claims`]: the claims set carried by a token
//! - [`content`]: AES based content encryption
//! - [`encryption`]: RSA key wrapping and the five-part compact serialization
//! - [`signing`]: JWS signing and verification backed by `jsonwebtoken`
//! - [`store`]: the registry of named key configurations built at startup
//! - [`decoder`]: routing of incoming tokens to the right engine

pub mod algorithms;
pub mod claims;
pub mod content;
pub mod decoder;
pub mod encryption;
pub mod keys;
pub mod signing;
pub mod store;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

pub use algorithms::{EncryptionMethod, JweAlgorithm};
pub use claims::ClaimsSet;
pub use decoder::TokenDecoder;
pub use encryption::{EncryptionConfiguration, RsaEncryption};
pub use signing::JwtSigner;
pub use store::{ConfigurationError, KeyMaterialStore};

/// Errors raised while encoding or decoding a token.
///
/// `DecryptionFailed` deliberately carries no detail: callers only learn that
/// the token could not be opened.
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Token decryption failed")]
    DecryptionFailed,

    #[error("Key configuration '{name}' has no {kind} key")]
    MissingKey { name: String, kind: &'static str },

    #[error("Invalid token signature: {0}")]
    InvalidSignature(String),

    #[error("Token has expired")]
    Expired,

    #[error("Token serialization failed: {0}")]
    Serialization(String),
}

pub(crate) fn b64_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn b64_decode(segment: &str, what: &str) -> Result<Vec<u8>, JwtError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JwtError::MalformedToken(format!("{} is not valid base64url", what)))
}
