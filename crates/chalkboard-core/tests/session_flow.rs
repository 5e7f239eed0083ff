//! End-to-end session behavior against a mock blog API.

use std::sync::Arc;
use std::time::Duration;

use chalkboard_core::api::{ApiError, BlogClient, RequestPipeline, SessionEvent};
use chalkboard_core::auth::{AuthState, FileCredentialStore, Role, SessionManager};
use chalkboard_core::guard::{self, Decision};
use chalkboard_core::Route;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn file_session(dir: &std::path::Path) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(Arc::new(FileCredentialStore::new(dir))))
}

#[tokio::test]
async fn test_login_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();

    let first = file_session(dir.path());
    first.restore();
    first.login("professor", "1234").unwrap();

    let second = file_session(dir.path());
    assert_eq!(second.state(), AuthState::Loading);
    assert_eq!(second.restore(), AuthState::Authenticated(Role::Professor));
    assert_eq!(second.current_token(), first.current_token());
}

#[tokio::test]
async fn test_rejected_token_forces_login() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/posts/42"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "jwt expired"})))
        .mount(&server)
        .await;

    let session = file_session(dir.path());
    session.restore();
    session.login("professor", "1234").unwrap();

    let (route_tx, route_rx) = watch::channel(Route::Edit("42".to_string()));
    let (events_tx, mut events_rx) = mpsc::channel(8);
    let pipeline = Arc::new(RequestPipeline::new(session.clone(), route_rx, events_tx));
    let client = BlogClient::with_timeout(&server.uri(), pipeline, Duration::from_secs(5)).unwrap();

    let mut draft = chalkboard_core::models::PostDraft::new("Matheus");
    draft.title = "t".into();
    draft.description = "d".into();
    draft.content = "c".into();
    let err = client.update_post("42", &draft).await.unwrap_err();

    // Error still reaches the caller
    assert!(ApiError::is_unauthorized_error(&err));

    // Session cleared in memory and on disk
    assert_eq!(session.state(), AuthState::Unauthenticated);
    assert!(!dir.path().join("session.json").exists());

    // The routing layer is told, and the guard now redirects
    let event = events_rx.recv().await.unwrap();
    assert_eq!(
        event,
        SessionEvent::Invalidated {
            url: "/posts/42".to_string()
        }
    );
    let current = route_tx.borrow().clone();
    assert_eq!(
        guard::check(session.state(), current.requirement()),
        Decision::RedirectToLogin
    );

    // A fresh start finds no session
    let restarted = file_session(dir.path());
    assert_eq!(restarted.restore(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn test_corrupt_session_file_is_cleared() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("session.json"), "{\"username\":\"professor\"").unwrap();

    let session = file_session(dir.path());
    assert_eq!(session.restore(), AuthState::Unauthenticated);
    assert!(!dir.path().join("session.json").exists());
}
