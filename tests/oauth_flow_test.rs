// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-oauth-login project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Full authorization code flow against the Rocket server, with a mocked
//! identity provider token endpoint returning a signed then encrypted ID token.

use std::sync::Arc;

use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::Algorithm;
use rocket::http::Status;
use rocket::local::asynchronous::{Client, LocalResponse};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use rust_oauth_login::config::{
    ClientAuthMethod, Config, EncryptionKeyConfig, ProviderConfig, ProviderEncryption,
    SignatureKeyConfig,
};
use rust_oauth_login::jwt::{ClaimsSet, EncryptionConfiguration, EncryptionMethod, JweAlgorithm};
use rust_oauth_login::oauth::{LoginEventPublisher, LoginOutcomeEvent};
use rust_oauth_login::web::{build_rocket, figment_from_config};
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CLIENT_ID: &str = "portal-client";
const SECRET_KEY: &str = "/qCJ7RyQIugza05wgFNN6R+c2/afrKlG5jJfZ0oQPis=";

struct TestServer {
    client: Client,
    provider: MockServer,
    config: Config,
    events: UnboundedReceiver<LoginOutcomeEvent>,
}

fn encryption_keys() -> EncryptionKeyConfig {
    let mut rng = rsa::rand_core::OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("RSA key generation");
    let public_key = RsaPublicKey::from(&private_key);
    let engine = base64::engine::general_purpose::STANDARD;
    EncryptionKeyConfig {
        name: "portal".to_string(),
        algorithm: JweAlgorithm::RsaOaep256,
        method: EncryptionMethod::A256Gcm,
        public_key: Some(
            engine.encode(
                public_key
                    .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
                    .expect("public PEM")
                    .as_bytes(),
            ),
        ),
        private_key: Some(
            engine.encode(
                private_key
                    .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
                    .expect("private PEM")
                    .as_bytes(),
            ),
        ),
    }
}

async fn start() -> TestServer {
    let _ = env_logger::builder().is_test(true).try_init();
    let provider = MockServer::start().await;

    let mut config = Config::default();
    config.server.secret_key = Some(SECRET_KEY.to_string());
    config.session.success_url = "/home".to_string();
    config.signatures.push(SignatureKeyConfig {
        name: "idp".to_string(),
        algorithm: Algorithm::HS256,
        secret: Some("identity-provider-shared-secret".to_string()),
        private_key: None,
        public_key: None,
        issuer: None,
    });
    config.encryption.push(encryption_keys());
    config.providers.push(ProviderConfig {
        name: "acme".to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: "acme-secret".to_string(),
        authorization_endpoint: "https://idp.example.com/authorize".to_string(),
        token_endpoint: format!("{}/token", provider.uri()),
        redirect_uri: "https://portal.example.com/oauth/callback/acme".to_string(),
        scope: "openid email".to_string(),
        encryption: Some(ProviderEncryption {
            algorithm: JweAlgorithm::RsaOaep256,
            method: EncryptionMethod::A256Gcm,
            key_reference: Some("portal".to_string()),
        }),
        signature: Some("idp".to_string()),
        require_signature: true,
        pkce: true,
        client_auth: ClientAuthMethod::ClientSecretPost,
        principal_claim: "sub".to_string(),
        timeout_secs: 5,
    });

    let (publisher, events) = LoginEventPublisher::channel();
    let figment = figment_from_config(&config).expect("figment");
    let rocket = build_rocket(figment, Arc::new(config.clone()), publisher).expect("rocket");
    let client = Client::tracked(rocket).await.expect("valid rocket instance");

    TestServer {
        client,
        provider,
        config,
        events,
    }
}

fn location(response: &LocalResponse<'_>) -> String {
    response
        .headers()
        .get_one("Location")
        .expect("Location header")
        .to_string()
}

/// Follow the login redirect and return the `state` sent to the provider
async fn begin_login(client: &Client, original_uri: &str) -> String {
    let response = client
        .get(format!("/oauth/login/acme?original_uri={}", original_uri))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Found);

    let authorize = Url::parse(&location(&response)).expect("absolute provider URL");
    assert_eq!(authorize.host_str(), Some("idp.example.com"));
    let query: Vec<(String, String)> = authorize.query_pairs().into_owned().collect();
    let param = |name: &str| {
        query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    assert_eq!(param("client_id").as_deref(), Some(CLIENT_ID));
    assert_eq!(param("response_type").as_deref(), Some("code"));
    assert_eq!(param("code_challenge_method").as_deref(), Some("S256"));
    let state = param("state").expect("state parameter");
    assert_eq!(param("nonce"), Some(state.clone()));
    state
}

fn id_token(config: &Config, nonce: &str) -> String {
    let signer = config.signatures[1].to_signer().expect("provider signer");
    let encryption = config.encryption[0].to_encryption().expect("encryption");
    let claims = ClaimsSet::new()
        .with("sub", "jdoe")
        .with("aud", CLIENT_ID)
        .with("nonce", nonce)
        .with("email", "jdoe@example.com")
        .with("exp", (Utc::now() + Duration::minutes(5)).timestamp());
    encryption
        .encrypt_signed(&claims, &signer)
        .expect("nested ID token")
}

#[rocket::async_test]
async fn test_successful_login_sets_session_cookie() {
    let mut server = start().await;
    let state = begin_login(&server.client, "/dashboard").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "opaque-access-token",
            "token_type": "Bearer",
            "id_token": id_token(&server.config, &state),
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server.provider)
        .await;

    let response = server
        .client
        .get(format!("/oauth/callback/acme?code=auth-code-1&state={}", state))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Found);
    assert_eq!(location(&response), "/dashboard");

    let session = response.cookies().get("JWT").expect("session cookie");
    assert_eq!(session.http_only(), Some(true));
    let session_signer = server.config.signatures[0].to_signer().expect("session signer");
    let claims = session_signer
        .verify(session.value(), None)
        .expect("valid session token");
    assert_eq!(claims.subject(), Some("jdoe"));
    assert_eq!(claims.get_str("provider"), Some("acme"));

    match server.events.try_recv().expect("login event") {
        LoginOutcomeEvent::Success { authentication, .. } => {
            assert_eq!(authentication.name, "jdoe");
            assert_eq!(authentication.provider, "acme");
        }
        other => panic!("unexpected event {:?}", other),
    }

    // The state was consumed by the first callback
    let replay = server
        .client
        .get(format!("/oauth/callback/acme?code=auth-code-1&state={}", state))
        .dispatch()
        .await;
    assert_eq!(replay.status(), Status::Unauthorized);
}

#[rocket::async_test]
async fn test_provider_error_is_unauthorized() {
    let mut server = start().await;
    let state = begin_login(&server.client, "/dashboard").await;

    let response = server
        .client
        .get(format!(
            "/oauth/callback/acme?error=access_denied&error_description=User%20cancelled&state={}",
            state
        ))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert!(response.cookies().get("JWT").is_none());

    match server.events.try_recv().expect("login event") {
        LoginOutcomeEvent::Failure { response, cause, .. } => {
            assert!(!response.is_authenticated());
            assert!(cause.unwrap_or_default().contains("access_denied"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[rocket::async_test]
async fn test_unknown_state_is_unauthorized() {
    let server = start().await;
    begin_login(&server.client, "/").await;

    let response = server
        .client
        .get("/oauth/callback/acme?code=auth-code-1&state=never-issued")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    assert!(server.provider.received_requests().await.unwrap_or_default().is_empty());
}

#[rocket::async_test]
async fn test_open_redirect_falls_back_to_success_url() {
    let server = start().await;
    let state = begin_login(&server.client, "https://evil.example.com/").await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "opaque-access-token",
            "id_token": id_token(&server.config, &state)
        })))
        .mount(&server.provider)
        .await;

    let response = server
        .client
        .get(format!("/oauth/callback/acme?code=c&state={}", state))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Found);
    assert_eq!(location(&response), "/home");
}

#[rocket::async_test]
async fn test_unknown_provider_is_not_found() {
    let server = start().await;
    let response = server.client.get("/oauth/login/nobody").dispatch().await;
    assert_eq!(response.status(), Status::NotFound);

    let response = server
        .client
        .get("/oauth/callback/nobody?code=c&state=s")
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);
}
