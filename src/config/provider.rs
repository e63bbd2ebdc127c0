// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Identity provider configuration

use serde::{Deserialize, Serialize};

use crate::jwt::{EncryptionMethod, JweAlgorithm};

/// How the client authenticates at the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// `client_id` and `client_secret` in the form body
    #[default]
    ClientSecretPost,
    /// HTTP Basic authentication
    ClientSecretBasic,
}

/// Encryption expected on the tokens a provider returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEncryption {
    pub algorithm: JweAlgorithm,

    pub method: EncryptionMethod,

    /// Name of the `encryption` entry holding the private key.
    ///
    /// Without it, every configured entry supporting the token's algorithm
    /// and method is tried.
    #[serde(default)]
    pub key_reference: Option<String>,
}

/// One identity provider.
///
/// `login` and `callback` endpoints are served under
/// `<mount_path>/login/<name>` and `<mount_path>/callback/<name>`.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,

    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    pub authorization_endpoint: String,

    pub token_endpoint: String,

    /// Absolute URL of this server's callback endpoint, registered with the provider
    pub redirect_uri: String,

    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default)]
    pub encryption: Option<ProviderEncryption>,

    /// Name of the `signatures` entry verifying the provider's tokens
    #[serde(default)]
    pub signature: Option<String>,

    /// Refuse encrypted tokens that carry no signature. Default is `true`.
    #[serde(default = "default_true")]
    pub require_signature: bool,

    /// Send a PKCE `S256` challenge. Default is `true`.
    #[serde(default = "default_true")]
    pub pkce: bool,

    #[serde(default)]
    pub client_auth: ClientAuthMethod,

    /// Claim holding the principal name. Default is "sub".
    #[serde(default = "default_principal_claim")]
    pub principal_claim: String,

    /// Timeout of the token exchange in seconds. Default is 10.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authorization_endpoint", &self.authorization_endpoint)
            .field("token_endpoint", &self.token_endpoint)
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .field("encryption", &self.encryption)
            .field("signature", &self.signature)
            .field("require_signature", &self.require_signature)
            .field("pkce", &self.pkce)
            .field("client_auth", &self.client_auth)
            .field("principal_claim", &self.principal_claim)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_scope() -> String {
    "openid".to_string()
}

fn default_true() -> bool {
    true
}

fn default_principal_claim() -> String {
    "sub".to_string()
}

fn default_timeout() -> u64 {
    10
}
