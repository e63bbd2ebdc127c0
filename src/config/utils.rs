// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use base64::Engine;
use log::{debug, warn};
use url::Url;

use super::keys::build_key_store;
use super::{Config, HostStrategy, DEFAULT_SESSION_SECRET};
use crate::jwt::ConfigurationError;
use crate::oauth::handler::MAX_SESSION_TTL_SECS;
use crate::oauth::state::MAX_STATE_TTL_SECS;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_oauth_login --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");
    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;
    println!("{}", formatted_schema);
    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Provider names appear in URL paths and cookie names
fn is_valid_provider_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn check_absolute_url(provider: &str, field: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)
        .with_context(|| format!("Provider '{}' has an invalid {}: {}", provider, field, value))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Provider '{}' {} must use http or https", provider, field);
    }
    Ok(())
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **TLS**: certificate and key are both present or both absent, and valid base64
/// - **Secret key**: valid base64 of at least 32 bytes
/// - **Port range** and **address format** of the server
/// - **Host**: the `fixed` strategy comes with a value
/// - **Lifetimes**: state and session TTLs stay within their maximum
/// - **Key material**: every `signatures` and `encryption` entry loads, names are unique
/// - **References**: session and provider key references resolve, the
///   session signer can sign and the session encryption key can encrypt
/// - **Providers**: unique URL-safe names, absolute endpoint URLs
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");
    let server = &config.server;

    match (&server.cert, &server.key) {
        (Some(cert), Some(key)) => {
            base64::engine::general_purpose::STANDARD
                .decode(cert)
                .context("SSL certificate is not valid base64")?;
            base64::engine::general_purpose::STANDARD
                .decode(key)
                .context("SSL key is not valid base64")?;
        }
        (Some(_), None) => anyhow::bail!("SSL certificate provided without a key"),
        (None, Some(_)) => anyhow::bail!("SSL key provided without a certificate"),
        (None, None) => (),
    }

    if let Some(secret_key) = &server.secret_key {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(secret_key)
            .context("Server secret key is not valid base64")?;
        if decoded.len() < 32 {
            anyhow::bail!("Server secret key must be at least 32 bytes long");
        }
    }

    if server.port < 1 || server.port > 65534 {
        anyhow::bail!("Invalid port number: {}", server.port);
    }

    if !is_valid_ip_address(&server.address) {
        debug!("Potentially invalid address format: {}", server.address);
    }

    if !server.mount_path.starts_with('/') {
        anyhow::bail!("Mount path must start with '/': {}", server.mount_path);
    }

    if server.host.strategy == HostStrategy::Fixed
        && server.host.value.as_deref().map_or(true, |v| v.trim().is_empty())
    {
        anyhow::bail!("Host strategy 'fixed' requires server.host.value");
    }

    if config.state.ttl_secs > MAX_STATE_TTL_SECS {
        anyhow::bail!(
            "state.ttl_secs is {} but may not exceed {}",
            config.state.ttl_secs,
            MAX_STATE_TTL_SECS
        );
    }
    if config.session.ttl_secs > MAX_SESSION_TTL_SECS {
        anyhow::bail!(
            "session.ttl_secs is {} but may not exceed {}",
            config.session.ttl_secs,
            MAX_SESSION_TTL_SECS
        );
    }
    if config.state.max_pending == 0 {
        anyhow::bail!("state.max_pending must be at least 1");
    }

    let store = build_key_store(&config.signatures, &config.encryption)?;

    if config
        .signatures
        .iter()
        .any(|s| s.secret.as_deref() == Some(DEFAULT_SESSION_SECRET))
    {
        warn!("A signature key still uses the default secret, change it before going to production");
    }

    let session_signer = store
        .signer(&config.session.signature)
        .map_err(|_| ConfigurationError::UnknownReference {
            provider: "session".to_string(),
            kind: "signature",
            name: config.session.signature.clone(),
        })?;
    if !session_signer.can_sign() {
        anyhow::bail!(
            "Session signature '{}' has no private key or secret to sign with",
            config.session.signature
        );
    }
    if let Some(encryption) = &config.session.encryption {
        let session_encryption =
            store
                .lookup(encryption)
                .map_err(|_| ConfigurationError::UnknownReference {
                    provider: "session".to_string(),
                    kind: "encryption",
                    name: encryption.clone(),
                })?;
        if !session_encryption.can_encrypt() {
            anyhow::bail!("Session encryption '{}' has no public key", encryption);
        }
    }

    let mut names = HashSet::new();
    for provider in &config.providers {
        if !is_valid_provider_name(&provider.name) {
            anyhow::bail!(
                "Provider name '{}' may only contain letters, digits, '-' and '_'",
                provider.name
            );
        }
        if !names.insert(provider.name.as_str()) {
            return Err(ConfigurationError::DuplicateProvider(provider.name.clone()).into());
        }

        check_absolute_url(&provider.name, "authorization_endpoint", &provider.authorization_endpoint)?;
        check_absolute_url(&provider.name, "token_endpoint", &provider.token_endpoint)?;
        check_absolute_url(&provider.name, "redirect_uri", &provider.redirect_uri)?;

        if let Some(signature) = &provider.signature {
            store
                .signer(signature)
                .map_err(|_| ConfigurationError::UnknownReference {
                    provider: provider.name.clone(),
                    kind: "signature",
                    name: signature.clone(),
                })?;
        }
        if let Some(reference) = provider
            .encryption
            .as_ref()
            .and_then(|e| e.key_reference.as_ref())
        {
            store
                .lookup(reference)
                .map_err(|_| ConfigurationError::UnknownReference {
                    provider: provider.name.clone(),
                    kind: "encryption",
                    name: reference.clone(),
                })?;
        }
    }

    Ok(())
}
