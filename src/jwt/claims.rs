// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JWT claims set
//!
//! Tokens exchanged with identity providers carry arbitrary claims, so the
//! claims set is kept as a JSON object with typed accessors for the
//! registered claims the login flow relies on.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::JwtError;

/// A JSON object of claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimsSet(Map<String, Value>);

impl ClaimsSet {
    pub fn new() -> Self {
        ClaimsSet(Map::new())
    }

    /// Builder style insertion of a claim
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns the claim as a string slice if it is a JSON string
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Subject (`sub`)
    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    /// Issuer (`iss`)
    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    /// Expiration time (`exp`), when present and representable
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.0
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Fails with [`JwtError::Expired`] when `exp` lies in the past.
    ///
    /// A claims set without `exp` is accepted; signed tokens get their `exp`
    /// enforced by the signature validation.
    pub fn check_expiration(&self, now: DateTime<Utc>) -> Result<(), JwtError> {
        match self.0.get("exp") {
            None => Ok(()),
            Some(_) => match self.expiration() {
                Some(exp) if exp > now => Ok(()),
                Some(_) => Err(JwtError::Expired),
                None => Err(JwtError::MalformedToken("exp is not a timestamp".into())),
            },
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// Canonical JSON serialization of the claims
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, JwtError> {
        serde_json::to_vec(&self.0).map_err(|e| JwtError::Serialization(e.to_string()))
    }

    /// Parse a decrypted payload. Anything but a JSON object is malformed.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, JwtError> {
        serde_json::from_slice::<Map<String, Value>>(bytes)
            .map(ClaimsSet)
            .map_err(|_| JwtError::MalformedToken("payload is not a JSON object".into()))
    }
}

impl From<Map<String, Value>> for ClaimsSet {
    fn from(map: Map<String, Value>) -> Self {
        ClaimsSet(map)
    }
}
