// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authentication outcome of a callback

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::jwt::ClaimsSet;

/// An authenticated principal and the claims it was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Authentication {
    /// Principal name, taken from the provider's configured claim
    pub name: String,
    /// Provider that authenticated the user
    pub provider: String,
    pub attributes: Map<String, Value>,
}

impl Authentication {
    pub fn from_claims(provider: &str, principal_claim: &str, claims: ClaimsSet) -> Option<Self> {
        let name = claims.get_str(principal_claim)?.to_string();
        Some(Self {
            name,
            provider: provider.to_string(),
            attributes: claims.into_inner(),
        })
    }
}

/// Why a login attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// Missing, unknown, expired, replayed or unbound `state`
    InvalidState,
    /// The provider answered with an `error` parameter
    ProviderDenied,
    /// The code could not be exchanged for tokens
    ExchangeFailed,
    /// The returned token could not be decrypted or verified
    InvalidToken,
    /// The user was authenticated but no session could be opened
    SessionFailed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::InvalidState => "InvalidState",
            FailureReason::ProviderDenied => "ProviderDenied",
            FailureReason::ExchangeFailed => "ExchangeFailed",
            FailureReason::InvalidToken => "InvalidToken",
            FailureReason::SessionFailed => "SessionFailed",
        };
        f.write_str(s)
    }
}

/// A failed attempt together with its internal cause.
///
/// The cause goes to event observers and logs, never to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub reason: FailureReason,
    pub cause: Option<String>,
}

impl LoginFailure {
    pub fn new(reason: FailureReason, cause: impl Into<String>) -> Self {
        Self {
            reason,
            cause: Some(cause.into()),
        }
    }
}

impl From<crate::jwt::JwtError> for LoginFailure {
    fn from(err: crate::jwt::JwtError) -> Self {
        LoginFailure::new(FailureReason::InvalidToken, err.to_string())
    }
}

/// Result of handling a callback. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AuthenticationResponse {
    Authenticated(Authentication),
    Failed {
        reason: FailureReason,
        /// Generic, user-safe message
        message: String,
    },
}

impl AuthenticationResponse {
    pub fn failed(reason: FailureReason) -> Self {
        let message = match reason {
            FailureReason::ProviderDenied => "The identity provider denied the request",
            _ => "Authentication failed",
        };
        AuthenticationResponse::Failed {
            reason,
            message: message.to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthenticationResponse::Authenticated(_))
    }

    pub fn authentication(&self) -> Option<&Authentication> {
        match self {
            AuthenticationResponse::Authenticated(auth) => Some(auth),
            AuthenticationResponse::Failed { .. } => None,
        }
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            AuthenticationResponse::Authenticated(_) => None,
            AuthenticationResponse::Failed { reason, .. } => Some(*reason),
        }
    }
}
