// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Host and locale resolution for login outcome events
//!
//! Both strategies are chosen explicitly in the configuration. A fixed
//! locale is only ever used because the operator asked for it, never as a
//! silent substitute for the request's own preference.

use crate::config::{HostConfig, HostStrategy, LocaleConfig, LocaleStrategy};
use crate::jwt::ConfigurationError;

/// Request data the resolvers work from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Value of the `Host` header
    pub host: Option<String>,
    /// Value of the `Accept-Language` header
    pub accept_language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostResolver {
    /// Use the request's `Host` header
    Request,
    /// Always report the configured host
    Fixed(String),
}

impl HostResolver {
    /// The `fixed` strategy needs a non-empty `value`
    pub fn from_config(config: &HostConfig) -> Result<Self, ConfigurationError> {
        match config.strategy {
            HostStrategy::Request => Ok(HostResolver::Request),
            HostStrategy::Fixed => match config.value.as_deref().map(str::trim) {
                Some(value) if !value.is_empty() => Ok(HostResolver::Fixed(value.to_string())),
                _ => Err(ConfigurationError::InvalidSetting {
                    setting: "server.host.value",
                    reason: "required by the fixed host strategy".to_string(),
                }),
            },
        }
    }

    pub fn resolve(&self, context: &RequestContext) -> Option<String> {
        match self {
            HostResolver::Request => context.host.clone(),
            HostResolver::Fixed(host) => Some(host.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleResolver {
    /// Always the configured locale
    Fixed(String),
    /// First language of `Accept-Language`, the default when absent
    AcceptLanguage { default: String },
}

impl LocaleResolver {
    pub fn from_config(config: &LocaleConfig) -> Self {
        match config.strategy {
            LocaleStrategy::Fixed => LocaleResolver::Fixed(config.default.clone()),
            LocaleStrategy::AcceptLanguage => LocaleResolver::AcceptLanguage {
                default: config.default.clone(),
            },
        }
    }

    pub fn resolve(&self, context: &RequestContext) -> String {
        match self {
            LocaleResolver::Fixed(locale) => locale.clone(),
            LocaleResolver::AcceptLanguage { default } => context
                .accept_language
                .as_deref()
                .and_then(first_language)
                .unwrap_or_else(|| default.clone()),
        }
    }
}

/// `fr-CH, fr;q=0.9, en;q=0.8` gives `fr-CH`
fn first_language(header: &str) -> Option<String> {
    header
        .split(',')
        .filter_map(|entry| entry.split(';').next())
        .map(str::trim)
        .find(|tag| !tag.is_empty() && *tag != "*")
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(host: Option<&str>, accept_language: Option<&str>) -> RequestContext {
        RequestContext {
            host: host.map(str::to_string),
            accept_language: accept_language.map(str::to_string),
        }
    }

    #[test]
    fn test_accept_language_strategy() {
        let resolver = LocaleResolver::AcceptLanguage {
            default: "en".into(),
        };
        assert_eq!(
            resolver.resolve(&context(None, Some("fr-CH, fr;q=0.9, en;q=0.8"))),
            "fr-CH"
        );
        assert_eq!(resolver.resolve(&context(None, Some("*"))), "en");
        assert_eq!(resolver.resolve(&context(None, None)), "en");
    }

    #[test]
    fn test_fixed_locale_ignores_request() {
        let resolver = LocaleResolver::Fixed("de".into());
        assert_eq!(resolver.resolve(&context(None, Some("fr"))), "de");
    }

    #[test]
    fn test_host_strategies() {
        let ctx = context(Some("login.example.com"), None);
        assert_eq!(
            HostResolver::Request.resolve(&ctx),
            Some("login.example.com".to_string())
        );
        assert_eq!(
            HostResolver::Fixed("sso.example.org".into()).resolve(&ctx),
            Some("sso.example.org".to_string())
        );
        assert_eq!(HostResolver::Request.resolve(&RequestContext::default()), None);
    }

    #[test]
    fn test_fixed_host_requires_value() {
        let fixed = HostConfig {
            strategy: HostStrategy::Fixed,
            value: Some("sso.example.org".into()),
        };
        assert_eq!(
            HostResolver::from_config(&fixed).unwrap(),
            HostResolver::Fixed("sso.example.org".into())
        );

        for value in [None, Some("".to_string()), Some("  ".to_string())] {
            let config = HostConfig {
                strategy: HostStrategy::Fixed,
                value,
            };
            assert!(matches!(
                HostResolver::from_config(&config),
                Err(ConfigurationError::InvalidSetting { setting: "server.host.value", .. })
            ));
        }

        assert_eq!(
            HostResolver::from_config(&HostConfig::default()).unwrap(),
            HostResolver::Request
        );
    }
}
