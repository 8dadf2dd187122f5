//! Provisioning over HTTP against a local orchestrator stand-in

use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use provisioning_core::testing::RecordingBackend;
use provisioning_core::{
    CompositeJobId, Error, JobController, OrchestratorClient, OrchestratorEndpoint, PollPolicy,
    ProvisionerConfig,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BASE_PATH: &str = "/orchestrator/deployments";

/// Status documents served in order; the last one repeats
#[derive(Default)]
struct FakeOrchestrator {
    statuses: Vec<&'static str>,
    polls: usize,
    deleted: Vec<String>,
}

type Shared = Arc<Mutex<FakeOrchestrator>>;

async fn create() -> (StatusCode, &'static str) {
    (StatusCode::CREATED, r#"{"uuid":"abc-123"}"#)
}

async fn fetch(State(state): State<Shared>, UrlPath(id): UrlPath<String>) -> (StatusCode, String) {
    if id != "abc-123" {
        return (StatusCode::NOT_FOUND, String::new());
    }
    let mut state = state.lock().unwrap();
    let index = state.polls.min(state.statuses.len() - 1);
    state.polls += 1;
    (StatusCode::OK, state.statuses[index].to_string())
}

async fn delete(State(state): State<Shared>, UrlPath(id): UrlPath<String>) -> StatusCode {
    state.lock().unwrap().deleted.push(id);
    StatusCode::NO_CONTENT
}

async fn spawn(statuses: Vec<&'static str>) -> (OrchestratorEndpoint, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakeOrchestrator {
        statuses,
        ..Default::default()
    }));
    let app = Router::new()
        .route(BASE_PATH, post(create))
        .route(
            &format!("{BASE_PATH}/:id"),
            get(fetch).delete(delete),
        )
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (OrchestratorEndpoint::new("127.0.0.1", port), state)
}

fn template() -> tempfile::NamedTempFile {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "node_templates:\n  vm: {}\n").unwrap();
    file
}

fn controller(
    endpoint: OrchestratorEndpoint,
    template: &std::path::Path,
) -> JobController<OrchestratorClient, RecordingBackend> {
    let config = ProvisionerConfig::default()
        .with_template(template)
        .with_poll(PollPolicy::new(Duration::from_millis(5), 5));
    JobController::new(OrchestratorClient::new(endpoint), RecordingBackend::new(), config)
}

#[tokio::test]
async fn submit_waits_for_completion_and_encodes_access_point() {
    let (endpoint, state) = spawn(vec![
        r#"{"status":"CREATE_IN_PROGRESS"}"#,
        r#"{"status":"CREATE_IN_PROGRESS"}"#,
        r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"22","username":"u","password":"p"}"#,
    ])
    .await;
    let file = template();
    let controller = controller(endpoint, file.path());

    let native = controller.submit("/bin/hostname", false, "job").await.unwrap();
    let job = CompositeJobId::decode(&native).unwrap();
    assert_eq!(job.deployment_id, "abc-123");
    assert_eq!(job.credentials.host, "10.0.0.5");
    assert_eq!(job.credentials.port, 22);
    assert_eq!(job.credentials.username, "u");
    assert_eq!(job.credentials.password, "p");
    assert_eq!(state.lock().unwrap().polls, 3);

    controller.cancel(&native).await.unwrap();
    assert_eq!(state.lock().unwrap().deleted, vec!["abc-123"]);
}

#[tokio::test]
async fn failed_deployment_is_deleted_once() {
    let (endpoint, state) = spawn(vec![
        r#"{"status":"CREATE_IN_PROGRESS"}"#,
        r#"{"status":"CREATE_FAILED","statusReason":"quota exceeded"}"#,
    ])
    .await;
    let file = template();
    let controller = controller(endpoint, file.path());

    let err = controller.submit("/bin/hostname", false, "job").await.unwrap_err();
    match err {
        Error::ProvisioningFailed { deployment_id, status } => {
            assert_eq!(deployment_id, "abc-123");
            assert_eq!(status, "CREATE_FAILED");
        }
        other => panic!("expected provisioning failure, got {other:?}"),
    }
    let state = state.lock().unwrap();
    assert_eq!(state.polls, 2);
    assert_eq!(state.deleted, vec!["abc-123"]);
}

#[tokio::test]
async fn garbage_status_bodies_end_in_timeout() {
    let (endpoint, state) = spawn(vec!["<html>gateway</html>"]).await;
    let file = template();
    let controller = controller(endpoint, file.path());

    let err = controller.submit("/bin/hostname", false, "job").await.unwrap_err();
    assert!(matches!(err, Error::ProvisioningTimeout { attempts: 5, .. }));
    assert!(err.to_string().contains("<html>gateway</html>"));
    assert_eq!(state.lock().unwrap().deleted, vec!["abc-123"]);
}
