// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Login outcome events
//!
//! One event is published per completed callback. Publication is a send on
//! an unbounded channel; whoever owns the receiving end decides what to do
//! with the events.

use log::{info, warn};
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::response::{Authentication, AuthenticationResponse};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LoginOutcomeEvent {
    Success {
        authentication: Authentication,
        host: Option<String>,
        locale: String,
    },
    Failure {
        response: AuthenticationResponse,
        /// Internal detail for observers, never shown to the user
        cause: Option<String>,
        host: Option<String>,
        locale: String,
    },
}

/// Sending half of the login event channel
#[derive(Debug, Clone)]
pub struct LoginEventPublisher {
    sender: Option<UnboundedSender<LoginOutcomeEvent>>,
}

impl LoginEventPublisher {
    /// Create a publisher and the receiver its events are delivered to
    pub fn channel() -> (Self, UnboundedReceiver<LoginOutcomeEvent>) {
        let (sender, receiver) = unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A publisher that drops every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn publish(&self, event: LoginOutcomeEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                warn!("Login event receiver is gone, event dropped");
            }
        }
    }
}

/// Drain the channel, logging every event
pub async fn log_events(mut receiver: UnboundedReceiver<LoginOutcomeEvent>) {
    while let Some(event) = receiver.recv().await {
        match event {
            LoginOutcomeEvent::Success {
                authentication,
                host,
                locale,
            } => info!(
                "Login succeeded: user [{}] via [{}] (host {:?}, locale {})",
                authentication.name, authentication.provider, host, locale
            ),
            LoginOutcomeEvent::Failure {
                response,
                host,
                locale,
                ..
            } => info!(
                "Login failed: {:?} (host {:?}, locale {})",
                response.failure_reason(),
                host,
                locale
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::response::FailureReason;

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (publisher, mut receiver) = LoginEventPublisher::channel();
        let failure = LoginOutcomeEvent::Failure {
            response: AuthenticationResponse::failed(FailureReason::ProviderDenied),
            cause: Some("access_denied".into()),
            host: None,
            locale: "en".into(),
        };
        publisher.publish(failure.clone());
        publisher.clone().publish(failure.clone());
        drop(publisher);

        assert_eq!(receiver.recv().await, Some(failure.clone()));
        assert_eq!(receiver.recv().await, Some(failure));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_disabled_publisher_is_silent() {
        LoginEventPublisher::disabled().publish(LoginOutcomeEvent::Failure {
            response: AuthenticationResponse::failed(FailureReason::InvalidState),
            cause: None,
            host: None,
            locale: "en".into(),
        });
    }
}
