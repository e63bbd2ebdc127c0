// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server builder and configuration
//!
//! This module provides functions to build and configure the Rocket server
//! instance with its routes, fairings and managed state.

use std::sync::Arc;

use anyhow::{Context, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use log::{debug, info};
use rocket::config::LogLevel;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{routes, Build, Rocket};

use super::routes::{callback, login};
use crate::config::Config;
use crate::oauth::state::spawn_purge_task;
use crate::oauth::{LoginEventPublisher, ProviderRegistry};

/// Settings the routes need at request time
#[derive(Debug, Clone)]
pub struct WebSettings {
    pub mount_path: String,
}

/// Rocket figment for the `server` section: binding, identity, cookie key and TLS
pub fn figment_from_config(config: &Config) -> Result<Figment> {
    let server = &config.server;
    let mut figment = rocket::Config::figment()
        .merge(("ident", server.name.clone()))
        .merge(("limits", Limits::new().limit("form", 64.kibibytes())))
        .merge(("address", server.address.clone()))
        .merge(("port", server.port))
        .merge(("log_level", LogLevel::Normal));

    if let Some(secret_key) = &server.secret_key {
        figment = figment.merge(("secret_key", secret_key.clone()));
    }

    if let (Some(cert), Some(key)) = (&server.cert, &server.key) {
        debug!("SSL certificates found in configuration, enabling TLS");
        let cert_data = BASE64_STANDARD
            .decode(cert)
            .context("SSL certificate is not valid base64")?;
        let key_data = BASE64_STANDARD
            .decode(key)
            .context("SSL key is not valid base64")?;
        figment = figment
            .merge(("tls.certs", cert_data))
            .merge(("tls.key", key_data));
        info!("TLS enabled for web server");
    }

    Ok(figment)
}

/// Build the login server.
///
/// Fails when the providers or keys of `config` cannot be set up. The
/// expired state purge starts once the server is listening.
pub fn build_rocket(
    figment: Figment,
    config: Arc<Config>,
    publisher: LoginEventPublisher,
) -> Result<Rocket<Build>> {
    let registry = ProviderRegistry::from_config(&config, publisher)
        .context("Failed to set up OAuth providers")?;
    let states = registry.states();
    let purge_interval = config.state.purge_interval_secs;
    let settings = WebSettings {
        mount_path: config.server.mount_path.clone(),
    };
    info!(
        "Serving {} OAuth provider(s) under {}",
        registry.providers().count(),
        settings.mount_path
    );

    Ok(rocket::custom(figment)
        .mount(settings.mount_path.as_str(), routes![login, callback])
        .manage(registry)
        .manage(settings)
        .manage(config)
        .attach(AdHoc::on_liftoff("OAuth state purge", move |_| {
            Box::pin(async move {
                debug!("Starting OAuth state purge every {}s", purge_interval);
                spawn_purge_task(states, purge_interval);
            })
        })))
}
