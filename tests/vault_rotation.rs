//! Rotation driven by a mocked Vault secrets engine.

mod common;

use common::{query, Backend, FakeFactory};
use pretty_assertions::assert_eq;
use rotaconn::config::{CredentialBackend, CredentialsConfig, VaultConfig};
use rotaconn::infra::secrets::build_source;
use rotaconn::sessions::{ErrorKind, RotationAwareSession, SessionState};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDS_PATH: &str = "/v1/database/creds/postgresql-role";

fn lease(username: &str, password: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "lease_id": format!("database/creds/postgresql-role/{password}"),
        "renewable": true,
        "lease_duration": 60,
        "data": { "username": username, "password": password }
    }))
}

fn credentials_for(server: &MockServer) -> CredentialsConfig {
    CredentialsConfig {
        backend: CredentialBackend::Vault,
        vault: VaultConfig {
            address: server.uri(),
            token: Some("s.probe".into()),
            timeout_ms: 1000,
            ..VaultConfig::default()
        },
        ..CredentialsConfig::default()
    }
}

#[tokio::test]
async fn rotates_to_the_next_vault_lease() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDS_PATH))
        .and(header("X-Vault-Token", "s.probe"))
        .respond_with(lease("v-token-postgres-a", "p1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CREDS_PATH))
        .respond_with(lease("v-token-postgres-b", "p2"))
        .mount(&server)
        .await;

    let source = build_source(&credentials_for(&server)).unwrap();
    let backend = Backend::accepting(&["p1"]);
    let session = RotationAwareSession::new(source, FakeFactory::new(backend.clone()));

    assert_eq!(
        session.execute(query).await,
        Ok("v-token-postgres-a:p1".to_string())
    );

    // Vault revoked the first lease.
    backend.accept_only(&["p2"]);
    assert_eq!(
        session.execute(query).await,
        Ok("v-token-postgres-b:p2".to_string())
    );

    let credential = session.credential().await.unwrap();
    assert_eq!(
        credential.lease_id(),
        Some("database/creds/postgresql-role/p2")
    );
    assert_eq!(session.stats().rotations, 1);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn vault_outage_during_rotation_is_retriable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CREDS_PATH))
        .respond_with(lease("v-token-postgres-a", "p1"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(CREDS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("sealed"))
        .mount(&server)
        .await;

    let source = build_source(&credentials_for(&server)).unwrap();
    let backend = Backend::accepting(&["p1"]);
    let session = RotationAwareSession::new(source, FakeFactory::new(backend.clone()));

    assert!(session.execute(query).await.is_ok());
    backend.accept_only(&["p2"]);

    let err = session.execute(query).await.unwrap_err();
    assert!(err.is_retriable());
    assert_eq!(err.kind(), ErrorKind::BackendUnreachable);
    assert!(err.message().contains("sealed"));
    assert_eq!(session.state(), SessionState::NoSession);
}

#[tokio::test]
async fn wrong_role_is_fatal_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errors": ["unknown role: postgresql-role"]
        })))
        .mount(&server)
        .await;

    let source = build_source(&credentials_for(&server)).unwrap();
    let backend = Backend::accepting(&["p1"]);
    let session = RotationAwareSession::new(source, FakeFactory::new(backend.clone()));

    let err = session.execute(query).await.unwrap_err();
    assert!(!err.is_retriable());
    assert_eq!(err.kind(), ErrorKind::InvalidConfiguration);
    assert_eq!(backend.opens(), 0);
}
