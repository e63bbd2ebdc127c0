// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Web server, login state and session configuration
//!
//! This module defines the `server`, `state` and `session` sections of the
//! configuration file.

use serde::{Deserialize, Serialize};

use crate::oauth::handler::DEFAULT_SESSION_TTL_SECS;
use crate::oauth::state::{DEFAULT_MAX_PENDING_STATES, DEFAULT_STATE_TTL_SECS};

/// Configuration for the login web server.
///
/// ### TLS Configuration
///
/// For HTTPS, both `cert` and `key` must be provided as Base64-encoded PEM
/// files. If neither is set, the server runs without TLS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The TCP port the server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 8080.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or a hostname. Default is "127.0.0.1".
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in HTTP headers and logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// Key for Rocket's private cookies, Base64 encoded (at least 32 bytes).
    ///
    /// The login state cookie is encrypted with it. When absent, a random
    /// key is generated at startup and pending logins do not survive a
    /// restart.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Path prefix of the login and callback endpoints. Default is "/oauth".
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// SSL/TLS certificate in PEM format, Base64 encoded.
    #[serde(default)]
    pub cert: Option<String>,

    /// SSL/TLS private key in PEM format, Base64 encoded.
    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub locale: LocaleConfig,

    #[serde(default)]
    pub host: HostConfig,
}

fn default_port() -> u16 {
    8080
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("OAuthLoginServer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_mount_path() -> String {
    "/oauth".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            name: default_name(),
            secret_key: None,
            mount_path: default_mount_path(),
            cert: None,
            key: None,
            locale: LocaleConfig::default(),
            host: HostConfig::default(),
        }
    }
}

/// How the locale reported in login events is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocaleStrategy {
    /// Always `default`
    Fixed,
    /// First language of the request's `Accept-Language`, else `default`
    AcceptLanguage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_locale_strategy")]
    pub strategy: LocaleStrategy,

    #[serde(default = "default_locale")]
    pub default: String,
}

fn default_locale_strategy() -> LocaleStrategy {
    LocaleStrategy::AcceptLanguage
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            strategy: default_locale_strategy(),
            default: default_locale(),
        }
    }
}

/// How the host reported in login events is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostStrategy {
    /// The request's `Host` header
    Request,
    /// Always `value`
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_host_strategy")]
    pub strategy: HostStrategy,

    /// Host reported with the `fixed` strategy
    #[serde(default)]
    pub value: Option<String>,
}

fn default_host_strategy() -> HostStrategy {
    HostStrategy::Request
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            strategy: default_host_strategy(),
            value: None,
        }
    }
}

/// Settings of pending login attempts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Lifetime of a login attempt in seconds. Default is 600, at most
    /// one day.
    #[serde(default = "default_state_ttl")]
    pub ttl_secs: u64,

    /// Maximum number of pending login attempts kept in memory. When full,
    /// the oldest attempt is forgotten. Default is 10000.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,

    /// Require the `state` parameter to match the one stored in the
    /// browser's private cookie. Default is `true`.
    #[serde(default = "default_true")]
    pub bind_to_cookie: bool,

    /// Period of the expired state purge in seconds. Default is 60.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_state_ttl() -> u64 {
    DEFAULT_STATE_TTL_SECS as u64
}

fn default_max_pending() -> usize {
    DEFAULT_MAX_PENDING_STATES
}

fn default_true() -> bool {
    true
}

fn default_purge_interval() -> u64 {
    60
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_state_ttl(),
            max_pending: default_max_pending(),
            bind_to_cookie: true,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// Session token issued after a successful login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie. Default is "JWT".
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Name of the `signatures` entry used to sign session tokens
    #[serde(default = "default_session_signature")]
    pub signature: String,

    /// Name of the `encryption` entry used to encrypt session tokens
    #[serde(default)]
    pub encryption: Option<String>,

    /// Lifetime of the session token in seconds. Default is 3600, at most
    /// one year.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Landing page when the requested page is missing or not local
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Page failures are redirected to. Without it failures answer 401.
    #[serde(default)]
    pub failure_url: Option<String>,
}

fn default_cookie_name() -> String {
    "JWT".to_string()
}

fn default_session_signature() -> String {
    "session".to_string()
}

fn default_session_ttl() -> u64 {
    DEFAULT_SESSION_TTL_SECS as u64
}

fn default_success_url() -> String {
    "/".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            signature: default_session_signature(),
            encryption: None,
            ttl_secs: default_session_ttl(),
            success_url: default_success_url(),
            failure_url: None,
        }
    }
}
