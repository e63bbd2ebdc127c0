// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Login and callback endpoints
//!
//! Both are mounted under the configured `mount_path`:
//!
//! | Route | Answer |
//! |-------|--------|
//! | `GET /login/<provider>?<original_uri>` | `302` to the provider |
//! | `GET /callback/<provider>?<code>&<state>&<error>&<error_description>` | `302` or `401` |
//!
//! An unknown provider answers `404`.

use log::debug;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::{Redirect, Responder};
use rocket::time::Duration;
use rocket::{get, Request, Response, State};

use super::server::WebSettings;
use crate::oauth::handler::SessionCookie;
use crate::oauth::{CallbackRequest, LoginRequest, LoginResponse, ProviderRegistry, RequestContext};

/// Private cookie binding a login attempt to the browser
pub fn state_cookie_name(provider: &str) -> String {
    format!("OAUTH2_STATE_{}", provider)
}

/// HTTP answer of the callback endpoint
pub enum LoginAnswer {
    Redirect(Redirect),
    /// `401` with an empty body
    Unauthorized,
}

impl<'r> Responder<'r, 'static> for LoginAnswer {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        match self {
            LoginAnswer::Redirect(redirect) => redirect.respond_to(request),
            LoginAnswer::Unauthorized => Response::build().status(Status::Unauthorized).ok(),
        }
    }
}

fn session_cookie(session: SessionCookie) -> Cookie<'static> {
    let mut cookie = Cookie::new(session.name, session.value);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_max_age(Duration::seconds(session.max_age_secs));
    cookie
}

/// Start a login with `provider`
#[get("/login/<provider>?<original_uri>")]
pub async fn login(
    provider: &str,
    original_uri: Option<String>,
    registry: &State<ProviderRegistry>,
    settings: &State<WebSettings>,
    cookies: &CookieJar<'_>,
) -> Option<Redirect> {
    let controller = registry.get(provider)?;
    let redirect = controller.login(LoginRequest { original_uri });

    let mut cookie = Cookie::new(state_cookie_name(provider), redirect.state);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path(settings.mount_path.clone());
    cookie.set_max_age(Duration::seconds(registry.states().ttl().num_seconds()));
    cookies.add_private(cookie);

    Some(Redirect::found(redirect.location))
}

/// Provider redirection endpoint
#[allow(clippy::too_many_arguments)]
#[get("/callback/<provider>?<code>&<state>&<error>&<error_description>")]
pub async fn callback(
    provider: &str,
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    context: RequestContext,
    registry: &State<ProviderRegistry>,
    settings: &State<WebSettings>,
    cookies: &CookieJar<'_>,
) -> Option<LoginAnswer> {
    let controller = registry.get(provider)?;

    let cookie_name = state_cookie_name(provider);
    let bound_state = cookies
        .get_private(&cookie_name)
        .map(|cookie| cookie.value().to_string());
    if bound_state.is_some() {
        let mut expired = Cookie::new(cookie_name, "");
        expired.set_path(settings.mount_path.clone());
        cookies.remove_private(expired);
    }

    let response = controller
        .callback(CallbackRequest {
            state,
            code,
            error,
            error_description,
            bound_state,
            context,
        })
        .await;

    Some(match response {
        LoginResponse::Redirect {
            location,
            session_cookie: session,
        } => {
            if let Some(session) = session {
                cookies.add(session_cookie(session));
            }
            debug!("Login with {} settled, redirecting", provider);
            LoginAnswer::Redirect(Redirect::found(location))
        }
        LoginResponse::Unauthorized => LoginAnswer::Unauthorized,
    })
}
