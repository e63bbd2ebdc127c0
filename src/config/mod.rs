// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the OAuth login server
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before being deserialized.
//!
//! ## Configuration Structure
//!
//! - `server`: web server binding, TLS, endpoint prefix, host and locale resolution
//! - `state`: lifetime and browser binding of pending login attempts
//! - `session`: session token issued after a successful login
//! - `signatures`: named JWS keys (HMAC or RSA)
//! - `encryption`: named RSA key pairs for JWE
//! - `providers`: identity providers
//!
//! ## Usage
//!
//! ```no_run
//! use rust_oauth_login::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(Some(8081), Some("0.0.0.0".to_string()));
//!
//! println!("Server port: {}", config.server.port);
//! ```

pub mod keys;
pub mod provider;
pub mod server;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use jsonwebtoken::Algorithm;
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use keys::{build_key_store, EncryptionKeyConfig, SignatureKeyConfig};
pub use provider::{ClientAuthMethod, ProviderConfig, ProviderEncryption};
pub use server::{
    HostConfig, HostStrategy, LocaleConfig, LocaleStrategy, ServerConfig, SessionConfig,
    StateConfig,
};
pub use utils::{is_valid_ip_address, output_config_schema, validate_specific_rules};

/// Placeholder secret of the default session signature key
pub const DEFAULT_SESSION_SECRET: &str = "change-me-session-signing-secret-0123456789";

/// Root configuration structure.
///
/// Every section falls back to its defaults when absent, so a minimal file
/// only needs a `providers` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// Named JWS keys. The default holds the HMAC key signing session tokens.
    #[serde(default = "default_signatures")]
    pub signatures: Vec<SignatureKeyConfig>,

    #[serde(default)]
    pub encryption: Vec<EncryptionKeyConfig>,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

fn default_signatures() -> Vec<SignatureKeyConfig> {
    vec![SignatureKeyConfig {
        name: "session".to_string(),
        algorithm: Algorithm::HS256,
        secret: Some(DEFAULT_SESSION_SECRET.to_string()),
        private_key: None,
        public_key: None,
        issuer: None,
    }]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            state: StateConfig::default(),
            session: SessionConfig::default(),
            signatures: default_signatures(),
            encryption: Vec::new(),
            providers: Vec::new(),
        }
    }
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample_path = path.as_ref().with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;
        Self::from_yaml_str(&contents).or_else(|err| {
            Self::create_sample_config(path)?;
            Err(err.context(format!("Invalid configuration in {}", path.display())))
        })
    }

    /// Parse, validate against the schema, deserialize and check a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = serde_yml::from_str(contents).map_err(|err| {
            error!("Configuration deserialization error: {}", err);
            anyhow::anyhow!("Failed to deserialize configuration: {}", err)
        })?;

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided override the existing configuration.
    ///
    /// # Parameters
    ///
    /// * `port` - TCP port of the login server
    /// * `address` - Network address the server binds to
    pub fn apply_args(&mut self, port: Option<u16>, address: Option<String>) {
        if let Some(port) = port {
            debug!("Overriding port from command line: {}", port);
            self.server.port = port;
        }

        if let Some(address) = address {
            debug!("Overriding address from command line: {}", address);
            self.server.address = address;
        }
    }

    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }
}
