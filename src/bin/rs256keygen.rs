// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use base64::Engine;
use clap::Parser;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_oauth_login::config::EncryptionKeyConfig;
use rust_oauth_login::jwt::{EncryptionMethod, JweAlgorithm};

/// Generate an RSA key pair for JWT encryption and signing
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Name of the generated `encryption` entry
    #[clap(long, default_value = "default")]
    name: String,

    /// Key management algorithm (RSA-OAEP or RSA-OAEP-256)
    #[clap(long, default_value = "RSA-OAEP-256")]
    algorithm: JweAlgorithm,

    /// Content encryption method
    #[clap(long, default_value = "A128GCM")]
    method: EncryptionMethod,

    /// Output path for the public key PEM file
    #[clap(long)]
    out_pub_key: Option<PathBuf>,

    /// Output path for the private key PEM file
    #[clap(long)]
    out_private_key: Option<PathBuf>,

    /// RSA key length in bits
    #[clap(long, default_value = "4096")]
    length: usize,
}

fn write_pem(path: &PathBuf, pem: &str) -> Result<()> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create key file at {:?}", path))?;
    file.write_all(pem.as_bytes())
        .with_context(|| format!("Failed to write key to {:?}", path))?;
    eprintln!("Key written to: {:?}", path);
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    eprintln!("Generating RSA key pair with {} bits...", args.length);

    let mut rng = rsa::rand_core::OsRng;
    let private_key =
        RsaPrivateKey::new(&mut rng, args.length).context("Failed to generate RSA private key")?;
    let public_key = RsaPublicKey::from(&private_key);

    // PKCS#1 PEM, the form the configuration loader expects
    let private_pem = private_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .context("Failed to encode private key to PEM")?;
    let public_pem = public_key
        .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
        .context("Failed to encode public key to PEM")?;

    if let Some(path) = &args.out_private_key {
        write_pem(path, &private_pem)?;
    }
    if let Some(path) = &args.out_pub_key {
        write_pem(path, &public_pem)?;
    }

    let entry = EncryptionKeyConfig {
        name: args.name,
        algorithm: args.algorithm,
        method: args.method,
        public_key: Some(base64::engine::general_purpose::STANDARD.encode(public_pem.as_bytes())),
        private_key: Some(
            base64::engine::general_purpose::STANDARD.encode(private_pem.as_bytes()),
        ),
    };
    let yaml = serde_yml::to_string(&vec![entry]).context("Failed to serialize key entry")?;

    eprintln!("Add this entry to the `encryption` section of config.yaml:");
    println!("{}", yaml);

    Ok(())
}
