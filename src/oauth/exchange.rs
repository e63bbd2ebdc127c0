// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authorization code exchange with the provider's token endpoint
//!
//! Every exchange is bounded by a timeout. A provider that does not answer
//! in time is treated like any other failed exchange.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;

use super::response::{FailureReason, LoginFailure};
use crate::config::ClientAuthMethod;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Token endpoint did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Token endpoint unreachable: {0}")]
    Transport(String),

    #[error("Token endpoint answered {status}: {error}")]
    Provider { status: u16, error: String },

    #[error("Invalid token endpoint response: {0}")]
    InvalidResponse(String),
}

impl From<ExchangeError> for LoginFailure {
    fn from(err: ExchangeError) -> Self {
        LoginFailure::new(FailureReason::ExchangeFailed, err.to_string())
    }
}

/// Successful token endpoint response (RFC 6749 §5.1)
#[derive(Clone, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchange of an authorization code for tokens
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn exchange(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, ExchangeError>;
}

/// [`TokenExchange`] over HTTP with `reqwest`
pub struct HttpTokenExchange {
    http: reqwest::Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_method: ClientAuthMethod,
    timeout: Duration,
}

impl std::fmt::Debug for HttpTokenExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenExchange")
            .field("token_endpoint", &self.token_endpoint)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("auth_method", &self.auth_method)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpTokenExchange {
    pub fn new(
        token_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        auth_method: ClientAuthMethod,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            token_endpoint: token_endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            auth_method,
            timeout,
        })
    }

    async fn send(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, ExchangeError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(verifier) = code_verifier {
            form.push(("code_verifier", verifier));
        }

        let mut request = self
            .http
            .post(&self.token_endpoint)
            .header(ACCEPT, "application/json");
        match self.auth_method {
            ClientAuthMethod::ClientSecretPost => {
                form.push(("client_secret", self.client_secret.as_str()));
            }
            ClientAuthMethod::ClientSecretBasic => {
                request = request.basic_auth(&self.client_id, Some(&self.client_secret));
            }
        }

        let response = request.form(&form).send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeError::Timeout(self.timeout)
            } else {
                ExchangeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ExchangeError::Transport(e.to_string()))?;

        if !status.is_success() {
            let error = match serde_json::from_slice::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{} ({})", err.error, description),
                    None => err.error,
                },
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
            };
            return Err(ExchangeError::Provider {
                status: status.as_u16(),
                error,
            });
        }

        // Some providers answer errors with a 200
        if let Ok(err) = serde_json::from_slice::<TokenErrorResponse>(&body) {
            return Err(ExchangeError::Provider {
                status: status.as_u16(),
                error: err.error,
            });
        }

        serde_json::from_slice::<TokenResponse>(&body)
            .map_err(|e| ExchangeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl TokenExchange for HttpTokenExchange {
    async fn exchange(
        &self,
        code: &str,
        code_verifier: Option<&str>,
    ) -> Result<TokenResponse, ExchangeError> {
        debug!("Exchanging authorization code at {}", self.token_endpoint);
        match tokio::time::timeout(self.timeout, self.send(code, code_verifier)).await {
            Ok(result) => result,
            Err(_) => Err(ExchangeError::Timeout(self.timeout)),
        }
    }
}
