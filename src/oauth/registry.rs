// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Provider registry
//!
//! One [`AuthorizationFlowController`] per configured provider, built once
//! from the configuration and never modified afterwards. All controllers
//! share the state store, the key store and the login handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use log::info;
use url::Url;

use super::client::DefaultOauthClient;
use super::controller::AuthorizationFlowController;
use super::events::LoginEventPublisher;
use super::exchange::HttpTokenExchange;
use super::handler::{LoginHandler, RedirectingLoginHandler, SessionTokenIssuer};
use super::resolver::{HostResolver, LocaleResolver};
use super::handler::MAX_SESSION_TTL_SECS;
use super::state::{OAuthStateManager, MAX_STATE_TTL_SECS};
use crate::config::{build_key_store, Config, ProviderConfig};
use crate::jwt::decoder::DecryptionKeys;
use crate::jwt::{ConfigurationError, KeyMaterialStore, TokenDecoder};

pub struct ProviderRegistry {
    controllers: HashMap<String, Arc<AuthorizationFlowController>>,
    states: Arc<OAuthStateManager>,
}

/// `secs` as a chrono duration, refusing values above `max`
pub(crate) fn bounded_seconds(
    setting: &'static str,
    secs: u64,
    max: u64,
) -> Result<Duration, ConfigurationError> {
    let out_of_range = || ConfigurationError::InvalidSetting {
        setting,
        reason: format!("{} exceeds the maximum of {} seconds", secs, max),
    };
    if secs > max {
        return Err(out_of_range());
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(out_of_range)
}

fn unknown_reference(provider: &str, kind: &'static str, name: &str) -> ConfigurationError {
    ConfigurationError::UnknownReference {
        provider: provider.to_string(),
        kind,
        name: name.to_string(),
    }
}

impl ProviderRegistry {
    pub fn from_config(
        config: &Config,
        publisher: LoginEventPublisher,
    ) -> Result<Self, ConfigurationError> {
        let keys = Arc::new(build_key_store(&config.signatures, &config.encryption)?);
        let state_ttl = bounded_seconds("state.ttl_secs", config.state.ttl_secs, MAX_STATE_TTL_SECS)?;
        let states = Arc::new(
            OAuthStateManager::new(state_ttl).with_max_pending(config.state.max_pending),
        );
        let handler = Self::login_handler(config, &keys)?;
        let host_resolver = HostResolver::from_config(&config.server.host)?;
        let locale_resolver = LocaleResolver::from_config(&config.server.locale);

        let mut controllers = HashMap::new();
        for provider in &config.providers {
            if controllers.contains_key(&provider.name) {
                return Err(ConfigurationError::DuplicateProvider(provider.name.clone()));
            }
            let client = Self::client(provider, &keys)?;
            let controller = AuthorizationFlowController::new(
                client,
                Arc::clone(&states),
                Arc::clone(&handler),
                publisher.clone(),
            )
            .with_resolvers(host_resolver.clone(), locale_resolver.clone())
            .bind_to_cookie(config.state.bind_to_cookie)
            .with_default_target(config.session.success_url.clone());
            info!("Registered OAuth provider '{}'", provider.name);
            controllers.insert(provider.name.clone(), Arc::new(controller));
        }

        Ok(Self {
            controllers,
            states,
        })
    }

    fn login_handler(
        config: &Config,
        keys: &KeyMaterialStore,
    ) -> Result<Arc<dyn LoginHandler>, ConfigurationError> {
        let session = &config.session;
        let signer = keys
            .signer(&session.signature)
            .map_err(|_| unknown_reference("session", "signature", &session.signature))?;
        if !signer.can_sign() {
            return Err(ConfigurationError::InvalidKey {
                name: session.signature.clone(),
                reason: "session tokens need a signing key, not only a public key".to_string(),
            });
        }
        let ttl = bounded_seconds("session.ttl_secs", session.ttl_secs, MAX_SESSION_TTL_SECS)?;
        let mut issuer = SessionTokenIssuer::new(signer, session.cookie_name.clone()).with_ttl(ttl);
        if let Some(name) = &session.encryption {
            let encryption = keys
                .lookup(name)
                .map_err(|_| unknown_reference("session", "encryption", name))?;
            if !encryption.can_encrypt() {
                return Err(ConfigurationError::InvalidKey {
                    name: name.clone(),
                    reason: "session token encryption needs a public key".to_string(),
                });
            }
            issuer = issuer.with_encryption(encryption);
        }

        let mut handler =
            RedirectingLoginHandler::new(session.success_url.clone()).with_session(issuer);
        if let Some(failure_url) = &session.failure_url {
            handler = handler.with_failure_url(failure_url.clone());
        }
        Ok(Arc::new(handler))
    }

    fn client(
        provider: &ProviderConfig,
        keys: &Arc<KeyMaterialStore>,
    ) -> Result<Arc<DefaultOauthClient>, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidProvider {
            name: provider.name.clone(),
            reason,
        };

        let authorization_endpoint = Url::parse(&provider.authorization_endpoint)
            .map_err(|e| invalid(format!("authorization_endpoint: {}", e)))?;
        let exchange = HttpTokenExchange::new(
            provider.token_endpoint.clone(),
            provider.client_id.clone(),
            provider.client_secret.clone(),
            provider.redirect_uri.clone(),
            provider.client_auth,
            StdDuration::from_secs(provider.timeout_secs),
        )
        .map_err(|e| invalid(format!("HTTP client: {}", e)))?;

        let signer = match &provider.signature {
            Some(name) => Some(
                keys.signer(name)
                    .map_err(|_| unknown_reference(&provider.name, "signature", name))?,
            ),
            None => None,
        };

        let decryption = match &provider.encryption {
            None => DecryptionKeys::None,
            Some(encryption) => match &encryption.key_reference {
                Some(name) => {
                    let config = keys
                        .lookup(name)
                        .map_err(|_| unknown_reference(&provider.name, "encryption", name))?;
                    if !config.supports(encryption.algorithm, encryption.method) {
                        return Err(invalid(format!(
                            "encryption '{}' does not handle {}/{}",
                            name, encryption.algorithm, encryption.method
                        )));
                    }
                    if !config.can_decrypt() {
                        return Err(invalid(format!("encryption '{}' has no private key", name)));
                    }
                    DecryptionKeys::Named(config)
                }
                None => DecryptionKeys::MultiTenant(Arc::clone(keys)),
            },
        };

        let decoder = TokenDecoder::new(decryption, signer)
            .with_audience(provider.client_id.clone())
            .allow_unsigned_encrypted(!provider.require_signature);

        Ok(Arc::new(
            DefaultOauthClient::new(
                provider.name.clone(),
                provider.client_id.clone(),
                authorization_endpoint,
                provider.redirect_uri.clone(),
                Arc::new(exchange),
                decoder,
            )
            .with_scope(provider.scope.clone())
            .with_pkce(provider.pkce)
            .with_principal_claim(provider.principal_claim.clone()),
        ))
    }

    pub fn get(&self, provider: &str) -> Option<Arc<AuthorizationFlowController>> {
        self.controllers.get(provider).cloned()
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.controllers.keys().map(String::as_str)
    }

    pub fn states(&self) -> Arc<OAuthStateManager> {
        Arc::clone(&self.states)
    }
}
