// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Provider clients
//!
//! An [`OauthClient`] knows one identity provider: how to send the browser
//! to it and how to turn the authorization code it hands back into an
//! authenticated principal.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use log::debug;
use sha2::{Digest, Sha256};
use url::Url;

use super::exchange::TokenExchange;
use super::response::{Authentication, FailureReason, LoginFailure};
use super::state::OAuthState;
use crate::jwt::TokenDecoder;

/// Outcome of a callback as seen by a client
pub type ClientOutcome = Result<Authentication, LoginFailure>;

#[async_trait]
pub trait OauthClient: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// URL the browser is redirected to for `state`
    fn authorization_url(&self, state: &OAuthState) -> String;

    /// Exchange `code` and authenticate the user.
    ///
    /// `None` means the client produced no outcome at all.
    async fn on_callback(&self, code: &str, state: &OAuthState) -> Option<ClientOutcome>;
}

/// PKCE `S256` challenge of a code verifier (RFC 7636 §4.2)
pub fn pkce_challenge(code_verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
}

/// Authorization code client driven by provider configuration
pub struct DefaultOauthClient {
    name: String,
    client_id: String,
    authorization_endpoint: Url,
    redirect_uri: String,
    scope: String,
    pkce: bool,
    principal_claim: String,
    exchange: Arc<dyn TokenExchange>,
    decoder: TokenDecoder,
}

impl DefaultOauthClient {
    pub fn new(
        name: impl Into<String>,
        client_id: impl Into<String>,
        authorization_endpoint: Url,
        redirect_uri: impl Into<String>,
        exchange: Arc<dyn TokenExchange>,
        decoder: TokenDecoder,
    ) -> Self {
        Self {
            name: name.into(),
            client_id: client_id.into(),
            authorization_endpoint,
            redirect_uri: redirect_uri.into(),
            scope: "openid".to_string(),
            pkce: true,
            principal_claim: "sub".to_string(),
            exchange,
            decoder,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_pkce(mut self, pkce: bool) -> Self {
        self.pkce = pkce;
        self
    }

    /// Claim used as the principal name
    pub fn with_principal_claim(mut self, claim: impl Into<String>) -> Self {
        self.principal_claim = claim.into();
        self
    }

    fn is_openid(&self) -> bool {
        self.scope.split_whitespace().any(|scope| scope == "openid")
    }
}

#[async_trait]
impl OauthClient for DefaultOauthClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization_url(&self, state: &OAuthState) -> String {
        let mut url = self.authorization_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("response_type", "code")
                .append_pair("scope", &self.scope)
                .append_pair("state", &state.nonce);
            if self.pkce {
                query
                    .append_pair("code_challenge", &pkce_challenge(&state.code_verifier))
                    .append_pair("code_challenge_method", "S256");
            }
            if self.is_openid() {
                query.append_pair("nonce", &state.nonce);
            }
        }
        url.into()
    }

    async fn on_callback(&self, code: &str, state: &OAuthState) -> Option<ClientOutcome> {
        let verifier = self.pkce.then_some(state.code_verifier.as_str());
        let tokens = match self.exchange.exchange(code, verifier).await {
            Ok(tokens) => tokens,
            Err(err) => return Some(Err(err.into())),
        };

        let (token, is_id_token) = match &tokens.id_token {
            Some(id_token) => (id_token.as_str(), true),
            None => (tokens.access_token.as_str(), false),
        };
        let claims = match self.decoder.decode(token) {
            Ok(claims) => claims,
            Err(err) => return Some(Err(err.into())),
        };
        debug!("Decoded {} token claims for {}", claims.iter().count(), self.name);

        if is_id_token && self.is_openid() && claims.get_str("nonce") != Some(state.nonce.as_str()) {
            return Some(Err(LoginFailure::new(
                FailureReason::InvalidToken,
                "ID token nonce does not match the login attempt",
            )));
        }

        Some(
            Authentication::from_claims(&self.name, &self.principal_claim, claims).ok_or_else(
                || {
                    LoginFailure::new(
                        FailureReason::InvalidToken,
                        format!("token has no '{}' claim", self.principal_claim),
                    )
                },
            ),
        )
    }
}
