// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OAuth login library
//!
//! OAuth2 Authorization Code login against configured identity providers,
//! with RSA-encrypted JWT issuance and verification.
//!
//! - [`config`]: YAML configuration, schema validation and defaults
//! - [`jwt`]: JWE encryption, JWS signing and the key material store
//! - [`oauth`]: login state, provider clients and the flow controller
//! - [`web`]: the Rocket endpoints

pub mod config;
pub mod jwt;
pub mod oauth;
pub mod web;
