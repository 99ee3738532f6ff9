#![allow(clippy::unwrap_used)]

use facegate::{
    api::ApiClient,
    capture::{CaptureMode, CaptureOrchestrator, CaptureOutcome, CaptureSettings, CaptureState, DirectoryCamera},
    credentials::{CredentialStore, EncryptedFileStorage},
    frame::CapturedFrame,
    session::{SessionManager, SessionStatus},
};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use std::{path::Path, sync::Arc};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

const PREFIX: &str = "/api/v1";

fn user_json() -> Value {
    json!({
        "id": 42,
        "name": "Alice",
        "phone_number": "+15550000",
        "face_enrolled": true,
        "created_at": "2024-05-01T10:20:30",
    })
}

fn auth_json(access: &str, refresh: &str) -> Value {
    json!({
        "access_token": access,
        "refresh_token": refresh,
        "token_type": "bearer",
        "similarity": 0.91,
        "liveness_passed": true,
        "user": user_json(),
    })
}

fn write_images(dir: &Path, count: usize) {
    for index in 0..count {
        std::fs::write(dir.join(format!("frame-{index}.jpg")), b"\xFF\xD8face").unwrap();
    }
}

fn session(server: &MockServer, store: &CredentialStore) -> SessionManager {
    let api = ApiClient::new(&format!("{}{PREFIX}", server.uri()), store.clone()).unwrap();
    SessionManager::new(api)
}

async fn verify_login(session: SessionManager, frames: Vec<CapturedFrame>) -> Result<(), String> {
    if session.login_face("Alice", frames).await {
        Ok(())
    } else {
        Err(session.snapshot().error.unwrap_or_default())
    }
}

#[tokio::test]
async fn enroll_then_restore_from_encrypted_store() {
    let server = MockServer::start().await;
    let store_dir = tempfile::tempdir().unwrap();
    let images = tempfile::tempdir().unwrap();
    write_images(images.path(), 1);

    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/register-face")))
        .respond_with(ResponseTemplate::new(201).set_body_json(auth_json("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PREFIX}/auth/me")))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::new(EncryptedFileStorage::new(store_dir.path()));
    let first = session(&server, &store);
    first.bootstrap().await;
    assert_eq!(first.status(), SessionStatus::Unauthenticated);

    let camera = Arc::new(DirectoryCamera::new(images.path()));
    let mut flow =
        CaptureOrchestrator::new(camera, CaptureMode::Enrollment, CaptureSettings::immediate());
    let registering = first.clone();
    let outcome = flow
        .run(|frames| async move {
            assert_eq!(frames.len(), 1);
            let image = frames.into_iter().next().unwrap();
            if registering.register_with_face("Alice", "+15550000", image).await {
                Ok(())
            } else {
                Err(registering.snapshot().error.unwrap_or_default())
            }
        })
        .await;

    assert_eq!(outcome, CaptureOutcome::Completed);
    assert_eq!(flow.state(), CaptureState::Success);
    assert_eq!(first.status(), SessionStatus::Authenticated);
    drop(flow);

    // A fresh process sees the same encrypted document.
    let reopened = CredentialStore::new(EncryptedFileStorage::new(store_dir.path()));
    let second = session(&server, &reopened);
    assert!(second.bootstrap().await);
    assert_eq!(second.snapshot().saved_username.as_deref(), Some("Alice"));
}

#[tokio::test]
async fn liveness_login_then_transparent_refresh() {
    let server = MockServer::start().await;
    let images = tempfile::tempdir().unwrap();
    write_images(images.path(), 3);

    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/login/face")))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_json("access-1", "refresh-1")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PREFIX}/auth/me")))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/token/refresh")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PREFIX}/auth/me")))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    store.save_username("Alice").await.unwrap();
    let manager = session(&server, &store);
    manager.bootstrap().await;
    assert_eq!(manager.status(), SessionStatus::NeedsReauth);

    let camera = Arc::new(DirectoryCamera::new(images.path()));
    let mut flow =
        CaptureOrchestrator::new(camera, CaptureMode::Liveness, CaptureSettings::immediate());
    let outcome = flow.run(|frames| verify_login(manager.clone(), frames)).await;
    assert_eq!(outcome, CaptureOutcome::Completed);
    assert_eq!(manager.status(), SessionStatus::Authenticated);

    assert!(manager.refresh_profile().await);
    let tokens = store.tokens().await.unwrap().unwrap();
    assert_eq!(tokens.access_token.expose_secret(), "access-2");
    assert_eq!(tokens.refresh_token.expose_secret(), "refresh-2");
}

#[tokio::test]
async fn rejected_login_can_be_retried_and_refresh_failure_signs_out() {
    let server = MockServer::start().await;
    let images = tempfile::tempdir().unwrap();
    write_images(images.path(), 2);

    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/login/face")))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"detail": "Face does not match"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/login/face")))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_json("access-1", "refresh-1")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PREFIX}/auth/me")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{PREFIX}/auth/token/refresh")))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let store = CredentialStore::in_memory();
    let manager = session(&server, &store);
    manager.bootstrap().await;

    let camera = Arc::new(DirectoryCamera::new(images.path()));
    let mut flow =
        CaptureOrchestrator::new(camera, CaptureMode::Liveness, CaptureSettings::immediate());

    let outcome = flow.run(|frames| verify_login(manager.clone(), frames)).await;
    assert_eq!(
        outcome,
        CaptureOutcome::Failed("Face not recognised. Please try again.".to_string())
    );
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(store.tokens().await.unwrap().is_none());

    let outcome = flow.retry(|frames| verify_login(manager.clone(), frames)).await;
    assert_eq!(outcome, CaptureOutcome::Completed);
    flow.dispose();

    assert!(!manager.refresh_profile().await);
    assert_eq!(manager.status(), SessionStatus::Unauthenticated);
    assert!(store.tokens().await.unwrap().is_none());
    assert!(store.username().await.unwrap().is_none());
}
