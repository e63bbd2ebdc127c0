// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Authorization Code flow for one provider
//!
//! A login attempt goes through `Initiated → AwaitingCallback → Completed`.
//! [`AuthorizationFlowController::login`] creates the state and the
//! provider redirect; [`AuthorizationFlowController::callback`] settles the
//! attempt. Every per-request error is caught here and turned into a
//! failed outcome, a published event and a handler response.
//!
//! ### Callback checks, in order
//!
//! 1. the `state` parameter is present and bound to this browser
//! 2. the state is known, fresh and not yet used (it is consumed here)
//! 3. the provider did not answer with `error`
//! 4. a `code` was received
//! 5. the client exchanges the code and authenticates the user
//! 6. the handler answers the authenticated response; only then is the
//!    success published

use std::sync::Arc;

use log::{debug, trace};

use super::client::OauthClient;
use super::events::{LoginEventPublisher, LoginOutcomeEvent};
use super::handler::{local_target, LoginHandler, LoginResponse};
use super::resolver::{HostResolver, LocaleResolver, RequestContext};
use super::response::{AuthenticationResponse, FailureReason, LoginFailure};
use super::state::OAuthStateManager;

#[derive(Debug, Clone, Default)]
pub struct LoginRequest {
    /// Where the user wants to land after logging in
    pub original_uri: Option<String>,
}

/// Redirect to the provider for a new login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub location: String,
    /// Nonce to bind to the browser
    pub state: String,
}

/// Parameters received on the callback endpoint
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    /// Nonce stored in the browser at login
    pub bound_state: Option<String>,
    pub context: RequestContext,
}

pub struct AuthorizationFlowController {
    client: Arc<dyn OauthClient>,
    states: Arc<OAuthStateManager>,
    handler: Arc<dyn LoginHandler>,
    publisher: LoginEventPublisher,
    host_resolver: HostResolver,
    locale_resolver: LocaleResolver,
    bind_to_cookie: bool,
    default_target: String,
}

impl AuthorizationFlowController {
    pub fn new(
        client: Arc<dyn OauthClient>,
        states: Arc<OAuthStateManager>,
        handler: Arc<dyn LoginHandler>,
        publisher: LoginEventPublisher,
    ) -> Self {
        Self {
            client,
            states,
            handler,
            publisher,
            host_resolver: HostResolver::Request,
            locale_resolver: LocaleResolver::AcceptLanguage {
                default: "en".to_string(),
            },
            bind_to_cookie: true,
            default_target: "/".to_string(),
        }
    }

    pub fn with_resolvers(mut self, host: HostResolver, locale: LocaleResolver) -> Self {
        self.host_resolver = host;
        self.locale_resolver = locale;
        self
    }

    /// Require the callback's state to match the one stored in the browser
    pub fn bind_to_cookie(mut self, bind: bool) -> Self {
        self.bind_to_cookie = bind;
        self
    }

    /// Landing page when the requested URI is missing or not local
    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
        self
    }

    pub fn provider(&self) -> &str {
        self.client.name()
    }

    pub fn login(&self, request: LoginRequest) -> LoginRedirect {
        let target = local_target(request.original_uri.as_deref(), &self.default_target);
        let state = self.states.create_state(target);
        debug!("Starting {} login, landing on {}", self.provider(), target);
        LoginRedirect {
            location: self.client.authorization_url(&state),
            state: state.nonce,
        }
    }

    pub async fn callback(&self, request: CallbackRequest) -> LoginResponse {
        let host = self.host_resolver.resolve(&request.context);
        let locale = self.locale_resolver.resolve(&request.context);

        let Some(nonce) = request.state.as_deref() else {
            trace!("Callback without state for {}", self.provider());
            return self.fail(
                LoginFailure::new(FailureReason::InvalidState, "missing state parameter"),
                host,
                locale,
            );
        };

        if self.bind_to_cookie && request.bound_state.as_deref() != Some(nonce) {
            trace!("Callback state is not bound to this browser");
            return self.fail(
                LoginFailure::new(FailureReason::InvalidState, "state not bound to this browser"),
                host,
                locale,
            );
        }

        let state = match self.states.validate_and_consume(nonce) {
            Ok(state) => state,
            Err(err) => {
                trace!("Callback state refused: {}", err);
                return self.fail(
                    LoginFailure::new(FailureReason::InvalidState, err.to_string()),
                    host,
                    locale,
                );
            }
        };

        if let Some(error) = request.error {
            let cause = match request.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            debug!("Provider {} denied the login: {}", self.provider(), cause);
            return self.fail(
                LoginFailure::new(FailureReason::ProviderDenied, cause),
                host,
                locale,
            );
        }

        let Some(code) = request.code else {
            return self.fail(
                LoginFailure::new(
                    FailureReason::ExchangeFailed,
                    "callback carried neither code nor error",
                ),
                host,
                locale,
            );
        };

        match self.client.on_callback(&code, &state).await {
            None => {
                debug!("Client {} produced no outcome", self.provider());
                LoginResponse::Unauthorized
            }
            Some(Ok(authentication)) => self.succeed(
                AuthenticationResponse::Authenticated(authentication),
                &state.original_uri,
                host,
                locale,
            ),
            Some(Err(failure)) => self.fail(failure, host, locale),
        }
    }

    fn succeed(
        &self,
        response: AuthenticationResponse,
        original_uri: &str,
        host: Option<String>,
        locale: String,
    ) -> LoginResponse {
        match self.handler.login_success(&response, original_uri) {
            Ok(answer) => {
                if let AuthenticationResponse::Authenticated(authentication) = response {
                    self.publisher.publish(LoginOutcomeEvent::Success {
                        authentication,
                        host,
                        locale,
                    });
                }
                answer
            }
            Err(failure) => self.fail(failure, host, locale),
        }
    }

    fn fail(&self, failure: LoginFailure, host: Option<String>, locale: String) -> LoginResponse {
        let response = AuthenticationResponse::failed(failure.reason);
        let answer = self.handler.login_failed(&response);
        self.publisher.publish(LoginOutcomeEvent::Failure {
            response,
            cause: failure.cause,
            host,
            locale,
        });
        answer
    }
}
