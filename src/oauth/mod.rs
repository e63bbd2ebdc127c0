// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! OAuth2 Authorization Code login
//!
//! The flow for one login attempt:
//!
//! 1. `login` creates an [`state::OAuthState`] and redirects to the provider
//! 2. the provider redirects back to `callback` with `code` and `state`
//! 3. the state is validated and consumed
//! 4. the code is exchanged for tokens, which are decrypted and verified
//! 5. a [`events::LoginOutcomeEvent`] is published and the
//!    [`handler::LoginHandler`] decides the HTTP answer

pub mod client;
pub mod controller;
pub mod events;
pub mod exchange;
pub mod handler;
pub mod registry;
pub mod resolver;
pub mod response;
pub mod state;

pub use client::{DefaultOauthClient, OauthClient};
pub use controller::{AuthorizationFlowController, CallbackRequest, LoginRedirect, LoginRequest};
pub use events::{LoginEventPublisher, LoginOutcomeEvent};
pub use exchange::{ExchangeError, HttpTokenExchange, TokenExchange, TokenResponse};
pub use handler::{LoginHandler, LoginResponse, RedirectingLoginHandler, SessionTokenIssuer};
pub use registry::ProviderRegistry;
pub use resolver::{HostResolver, LocaleResolver, RequestContext};
pub use response::{Authentication, AuthenticationResponse, FailureReason, LoginFailure};
pub use state::{OAuthState, OAuthStateManager, StateError};
