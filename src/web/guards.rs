// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Request guards

use std::convert::Infallible;

use rocket::request::{FromRequest, Outcome, Request};

use crate::oauth::RequestContext;

/// Extracts the `Host` and `Accept-Language` headers. Never fails.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestContext {
    type Error = Infallible;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RequestContext {
            host: request.host().map(|host| host.to_string()),
            accept_language: request
                .headers()
                .get_one("Accept-Language")
                .map(str::to_string),
        })
    }
}
