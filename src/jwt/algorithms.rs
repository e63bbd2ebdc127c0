// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWE algorithm identifiers
//!
//! Key management algorithms (`alg` header) and content encryption methods
//! (`enc` header) understood by the encryption engine. Names follow the
//! registered JOSE identifiers so they can be used verbatim in configuration
//! files and token headers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::JwtError;

/// Key management algorithm used to wrap the content encryption key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JweAlgorithm {
    /// RSAES OAEP using SHA-1 and MGF1 with SHA-1
    #[serde(rename = "RSA-OAEP")]
    RsaOaep,
    /// RSAES OAEP using SHA-256 and MGF1 with SHA-256
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
}

impl JweAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            JweAlgorithm::RsaOaep => "RSA-OAEP",
            JweAlgorithm::RsaOaep256 => "RSA-OAEP-256",
        }
    }
}

impl Default for JweAlgorithm {
    fn default() -> Self {
        JweAlgorithm::RsaOaep256
    }
}

impl fmt::Display for JweAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JweAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RSA-OAEP" => Ok(JweAlgorithm::RsaOaep),
            "RSA-OAEP-256" => Ok(JweAlgorithm::RsaOaep256),
            other => Err(JwtError::UnsupportedAlgorithm(format!("alg {}", other))),
        }
    }
}

/// Content encryption method applied to the token payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// AES GCM using a 128-bit key
    #[serde(rename = "A128GCM")]
    A128Gcm,
    /// AES GCM using a 256-bit key
    #[serde(rename = "A256GCM")]
    A256Gcm,
    /// AES_128_CBC_HMAC_SHA_256 authenticated encryption
    #[serde(rename = "A128CBC-HS256")]
    A128CbcHs256,
    /// AES_256_CBC_HMAC_SHA_512 authenticated encryption
    #[serde(rename = "A256CBC-HS512")]
    A256CbcHs512,
}

impl EncryptionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncryptionMethod::A128Gcm => "A128GCM",
            EncryptionMethod::A256Gcm => "A256GCM",
            EncryptionMethod::A128CbcHs256 => "A128CBC-HS256",
            EncryptionMethod::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    /// Length in bytes of the content encryption key.
    ///
    /// For the CBC-HMAC composites this is the MAC key and the AES key
    /// concatenated.
    pub fn cek_len(&self) -> usize {
        match self {
            EncryptionMethod::A128Gcm => 16,
            EncryptionMethod::A256Gcm => 32,
            EncryptionMethod::A128CbcHs256 => 32,
            EncryptionMethod::A256CbcHs512 => 64,
        }
    }

    /// Length in bytes of the initialization vector.
    pub fn iv_len(&self) -> usize {
        match self {
            EncryptionMethod::A128Gcm | EncryptionMethod::A256Gcm => 12,
            EncryptionMethod::A128CbcHs256 | EncryptionMethod::A256CbcHs512 => 16,
        }
    }

    /// Length in bytes of the authentication tag.
    pub fn tag_len(&self) -> usize {
        match self {
            EncryptionMethod::A128Gcm | EncryptionMethod::A256Gcm => 16,
            EncryptionMethod::A128CbcHs256 => 16,
            EncryptionMethod::A256CbcHs512 => 32,
        }
    }
}

impl Default for EncryptionMethod {
    fn default() -> Self {
        EncryptionMethod::A128Gcm
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionMethod {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A128GCM" => Ok(EncryptionMethod::A128Gcm),
            "A256GCM" => Ok(EncryptionMethod::A256Gcm),
            "A128CBC-HS256" => Ok(EncryptionMethod::A128CbcHs256),
            "A256CBC-HS512" => Ok(EncryptionMethod::A256CbcHs512),
            other => Err(JwtError::UnsupportedAlgorithm(format!("enc {}", other))),
        }
    }
}
