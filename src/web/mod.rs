// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP surface of the login flow, served by Rocket

pub mod guards;
pub mod routes;
pub mod server;

pub use server::{build_rocket, figment_from_config};
