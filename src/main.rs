// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point of the OAuth login server

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;
use rust_oauth_login::config::{output_config_schema, Config};
use rust_oauth_login::oauth::events::log_events;
use rust_oauth_login::oauth::LoginEventPublisher;
use rust_oauth_login::web::{build_rocket, figment_from_config};

/// OAuth2 login server with RSA-encrypted JWT support
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Web server port, overrides the configuration
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Web server address, overrides the configuration
    #[arg(short, long)]
    address: Option<String>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

#[rocket::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.show_config_schema {
        return output_config_schema();
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(args.port, args.address);
    info!(
        "Starting login server on {}:{}",
        config.server.address, config.server.port
    );

    let (publisher, events) = LoginEventPublisher::channel();
    tokio::spawn(log_events(events));

    let figment = figment_from_config(&config)?;
    let rocket = build_rocket(figment, Arc::new(config), publisher)?;
    let _rocket = rocket.ignite().await?.launch().await?;

    Ok(())
}
