// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Login handlers
//!
//! The handler decides what the browser sees once a callback is settled.
//! [`RedirectingLoginHandler`] sends successful logins back to where they
//! started with a session token cookie, and failures either to a failure
//! page or to a bare `401 Unauthorized`. A success the handler cannot
//! complete (no session token could be minted) is reported back as a
//! [`LoginFailure`] and settled as a failure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use log::{debug, error};

use super::response::{Authentication, AuthenticationResponse, FailureReason, LoginFailure};
use crate::jwt::{ClaimsSet, EncryptionConfiguration, JwtError, JwtSigner};

/// Default lifetime of a session token, in seconds
pub const DEFAULT_SESSION_TTL_SECS: i64 = 3600;

/// Longest accepted lifetime of a session token (one year)
pub const MAX_SESSION_TTL_SECS: u64 = 31_536_000;

/// Claims copied from the provider's token into the session token
const FORWARDED_CLAIMS: [&str; 3] = ["email", "name", "preferred_username"];

/// Cookie carrying the session token
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
}

impl std::fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

/// What the HTTP layer must answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginResponse {
    /// `302 Found` to `location`, optionally setting a session cookie
    Redirect {
        location: String,
        session_cookie: Option<SessionCookie>,
    },
    /// `401 Unauthorized` with no body
    Unauthorized,
}

pub trait LoginHandler: Send + Sync {
    /// Answer for an `Authenticated` response
    fn login_success(
        &self,
        response: &AuthenticationResponse,
        original_uri: &str,
    ) -> Result<LoginResponse, LoginFailure>;

    fn login_failed(&self, response: &AuthenticationResponse) -> LoginResponse;
}

/// Keep `uri` only when it stays on this site.
///
/// Accepts absolute paths (`/app?x=1`); rejects full URLs, scheme-relative
/// `//host` forms and backslash tricks.
pub fn local_target<'a>(uri: Option<&'a str>, fallback: &'a str) -> &'a str {
    match uri {
        Some(uri)
            if uri.starts_with('/')
                && !uri.starts_with("//")
                && !uri.contains('\\')
                && !uri.chars().any(char::is_control) =>
        {
            uri
        }
        _ => fallback,
    }
}

/// Mints session tokens for authenticated users
#[derive(Clone)]
pub struct SessionTokenIssuer {
    signer: Arc<JwtSigner>,
    encryption: Option<Arc<dyn EncryptionConfiguration>>,
    ttl: Duration,
    cookie_name: String,
}

impl SessionTokenIssuer {
    pub fn new(signer: Arc<JwtSigner>, cookie_name: impl Into<String>) -> Self {
        Self {
            signer,
            encryption: None,
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            cookie_name: cookie_name.into(),
        }
    }

    /// Encrypt session tokens (signed then encrypted)
    pub fn with_encryption(mut self, encryption: Arc<dyn EncryptionConfiguration>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, authentication: &Authentication) -> Result<SessionCookie, JwtError> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| JwtError::Serialization("session lifetime out of range".to_string()))?;
        let mut claims = ClaimsSet::new()
            .with("sub", authentication.name.clone())
            .with("provider", authentication.provider.clone())
            .with("iat", now.timestamp())
            .with("exp", expires_at.timestamp());
        for name in FORWARDED_CLAIMS {
            if let Some(value) = authentication.attributes.get(name) {
                claims.insert(name, value.clone());
            }
        }

        let token = match &self.encryption {
            Some(encryption) => encryption.encrypt_signed(&claims, &self.signer)?,
            None => self.signer.sign(&claims)?,
        };
        Ok(SessionCookie {
            name: self.cookie_name.clone(),
            value: token,
            max_age_secs: self.ttl.num_seconds(),
        })
    }
}

pub struct RedirectingLoginHandler {
    issuer: Option<SessionTokenIssuer>,
    success_url: String,
    failure_url: Option<String>,
}

impl RedirectingLoginHandler {
    pub fn new(success_url: impl Into<String>) -> Self {
        Self {
            issuer: None,
            success_url: success_url.into(),
            failure_url: None,
        }
    }

    pub fn with_session(mut self, issuer: SessionTokenIssuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    /// Redirect failures there instead of answering 401
    pub fn with_failure_url(mut self, failure_url: impl Into<String>) -> Self {
        self.failure_url = Some(failure_url.into());
        self
    }

    fn failure(&self) -> LoginResponse {
        match &self.failure_url {
            Some(location) => LoginResponse::Redirect {
                location: location.clone(),
                session_cookie: None,
            },
            None => LoginResponse::Unauthorized,
        }
    }
}

impl LoginHandler for RedirectingLoginHandler {
    fn login_success(
        &self,
        response: &AuthenticationResponse,
        original_uri: &str,
    ) -> Result<LoginResponse, LoginFailure> {
        let Some(authentication) = response.authentication() else {
            return Err(LoginFailure::new(
                FailureReason::SessionFailed,
                "no authenticated principal",
            ));
        };
        let location = local_target(Some(original_uri), &self.success_url).to_string();
        let session_cookie = match &self.issuer {
            Some(issuer) => Some(issuer.issue(authentication).map_err(|err| {
                error!("Failed to issue session token: {}", err);
                LoginFailure::new(FailureReason::SessionFailed, err.to_string())
            })?),
            None => None,
        };
        debug!("Redirecting {} to {}", authentication.name, location);
        Ok(LoginResponse::Redirect {
            location,
            session_cookie,
        })
    }

    fn login_failed(&self, _response: &AuthenticationResponse) -> LoginResponse {
        self.failure()
    }
}
