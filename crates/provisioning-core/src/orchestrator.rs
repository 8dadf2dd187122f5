//! Orchestrator API client.
//!
//! [`OrchestratorApi`] is the seam the provisioning logic talks to;
//! [`OrchestratorClient`] implements it over HTTP with `reqwest`.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::OrchestratorEndpoint;
use crate::deployment::Deployment;
use crate::{Error, Result};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations this crate needs from the orchestration service
#[async_trait]
pub trait OrchestratorApi: Send + Sync {
    /// Read `template` and ask the orchestrator to deploy it
    async fn create_deployment(&self, template: &Path) -> Result<Deployment>;

    /// Fetch the current state of a deployment.
    ///
    /// HTTP failures are returned as errors but are not judged here; the
    /// poll loop decides whether they are fatal.
    async fn fetch_deployment(&self, id: &str) -> Result<Deployment>;

    /// Delete a deployment. An empty id is a no-op.
    async fn delete_deployment(&self, id: &str) -> Result<()>;
}

/// HTTP client for the orchestrator deployment collection
#[derive(Clone)]
pub struct OrchestratorClient {
    endpoint: OrchestratorEndpoint,
    client: reqwest::Client,
}

impl OrchestratorClient {
    /// Create a client for the given endpoint
    pub fn new(endpoint: OrchestratorEndpoint) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { endpoint, client }
    }

    /// The endpoint this client talks to
    pub fn endpoint(&self) -> &OrchestratorEndpoint {
        &self.endpoint
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.endpoint.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn unreachable(&self, url: &str, e: reqwest::Error) -> Error {
        Error::ServiceUnreachable {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl OrchestratorApi for OrchestratorClient {
    async fn create_deployment(&self, template: &Path) -> Result<Deployment> {
        let content = async_fs::read_to_string(template)
            .await
            .map_err(|source| Error::TemplateUnreadable {
                path: template.to_path_buf(),
                source,
            })?;

        let url = self.endpoint.url();
        let body = serde_json::json!({ "template": content });
        debug!("Creating deployment at {} from template {}", url, template.display());

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(&url, e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.unreachable(&url, e))?;
        debug!("Orchestrator answered {} to deployment creation", status);

        if status != StatusCode::CREATED {
            return Err(Error::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
                body: text,
            });
        }

        let deployment = Deployment::from_creation_document(&text)?;
        info!("Created deployment '{}'", deployment.id);
        Ok(deployment)
    }

    async fn fetch_deployment(&self, id: &str) -> Result<Deployment> {
        let url = self.endpoint.deployment_url(id);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.unreachable(&url, e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.unreachable(&url, e))?;
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                endpoint: url,
                status: status.as_u16(),
                body: text,
            });
        }

        let deployment = Deployment::from_status_document(id, &text)?;
        debug!(
            "Deployment {} has status '{}' and {} outputs",
            id,
            deployment.status,
            deployment.outputs.len()
        );
        Ok(deployment)
    }

    async fn delete_deployment(&self, id: &str) -> Result<()> {
        if id.is_empty() {
            warn!("Called delete on an empty deployment id");
            return Ok(());
        }

        let url = self.endpoint.deployment_url(id);
        let response = self
            .authorize(self.client.delete(&url))
            .send()
            .await
            .map_err(|e| Error::CleanupFailed {
                deployment_id: id.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            info!("Deleted deployment '{}'", id);
            return Ok(());
        }
        if status == StatusCode::NOT_FOUND {
            debug!("Deployment '{}' was already gone", id);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::CleanupFailed {
            deployment_id: id.to_string(),
            reason: format!("orchestrator answered {status}: '{body}'"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path as UrlPath;
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use crate::testing::CapturedLogs;
    use std::sync::{Arc, Mutex};

    const BASE_PATH: &str = "/orchestrator/deployments";

    async fn spawn_server(app: Router) -> OrchestratorEndpoint {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        OrchestratorEndpoint::new("127.0.0.1", addr.port())
    }

    fn template_file(content: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), content).unwrap();
        file
    }

    #[tokio::test]
    async fn create_deployment_embeds_template_and_reads_uuid() {
        let seen = Arc::new(Mutex::new(None::<(serde_json::Value, Option<String>)>));
        let recorder = seen.clone();
        let app = Router::new().route(
            BASE_PATH,
            post(move |headers: HeaderMap, axum::Json(body): axum::Json<serde_json::Value>| {
                let recorder = recorder.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *recorder.lock().unwrap() = Some((body, auth));
                    (StatusCode::CREATED, r#"{"uuid":"abc-123"}"#)
                }
            }),
        );
        let endpoint = spawn_server(app).await.with_token("secret-token");
        let template = template_file("tosca_definitions_version: x\n  node: \"vm\"\n");

        let client = OrchestratorClient::new(endpoint);
        let deployment = client.create_deployment(template.path()).await.unwrap();
        assert_eq!(deployment.id, "abc-123");
        assert_eq!(deployment.status, crate::DeploymentStatus::InProgress);

        let (body, auth) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["template"], "tosca_definitions_version: x\n  node: \"vm\"\n");
        assert_eq!(auth.as_deref(), Some("Bearer secret-token"));
    }

    #[tokio::test]
    async fn create_deployment_rejects_non_created_status() {
        let app = Router::new().route(
            BASE_PATH,
            post(|| async { (StatusCode::OK, r#"{"uuid":"abc-123"}"#) }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);
        let template = template_file("tpl");

        let err = client.create_deployment(template.path()).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 200, .. }));
    }

    #[tokio::test]
    async fn create_deployment_reports_unparsable_body() {
        let app = Router::new().route(
            BASE_PATH,
            post(|| async { (StatusCode::CREATED, "not json at all") }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);
        let template = template_file("tpl");

        let err = client.create_deployment(template.path()).await.unwrap_err();
        assert!(matches!(err, Error::ResponseUnparsable { .. }));
        assert!(err.to_string().contains("not json at all"));
    }

    #[tokio::test]
    async fn create_deployment_with_missing_template() {
        let client = OrchestratorClient::new(OrchestratorEndpoint::new("127.0.0.1", 1));
        let err = client
            .create_deployment(Path::new("/definitely/not/here.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TemplateUnreadable { .. }));
    }

    #[tokio::test]
    async fn create_deployment_with_unreachable_orchestrator() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = OrchestratorClient::new(OrchestratorEndpoint::new("127.0.0.1", port));
        let template = template_file("tpl");
        let err = client.create_deployment(template.path()).await.unwrap_err();
        assert!(matches!(err, Error::ServiceUnreachable { .. }));
    }

    #[tokio::test]
    async fn fetch_deployment_parses_status_and_outputs() {
        let app = Router::new().route(
            &format!("{BASE_PATH}/:id"),
            get(|UrlPath(id): UrlPath<String>| async move {
                assert_eq!(id, "abc-123");
                r#"{"uuid":"abc-123","status":"CREATE_COMPLETE","outputs":{"host":"10.0.0.5","port":22}}"#
            }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);

        let deployment = client.fetch_deployment("abc-123").await.unwrap();
        assert_eq!(deployment.status, crate::DeploymentStatus::Complete);
        assert_eq!(deployment.output("host"), Some("10.0.0.5"));
        assert_eq!(deployment.output("port"), Some("22"));
    }

    #[tokio::test]
    async fn fetch_deployment_surfaces_http_errors() {
        let app = Router::new().route(
            &format!("{BASE_PATH}/:id"),
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);

        let err = client.fetch_deployment("abc-123").await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn delete_deployment_treats_not_found_as_released() {
        let deleted = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorder = deleted.clone();
        let app = Router::new().route(
            &format!("{BASE_PATH}/:id"),
            axum::routing::delete(move |UrlPath(id): UrlPath<String>| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().unwrap().push(id.clone());
                    if id == "gone" {
                        StatusCode::NOT_FOUND
                    } else if id == "stuck" {
                        StatusCode::CONFLICT
                    } else {
                        StatusCode::NO_CONTENT
                    }
                }
            }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);

        client.delete_deployment("abc-123").await.unwrap();
        client.delete_deployment("gone").await.unwrap();
        let err = client.delete_deployment("stuck").await.unwrap_err();
        assert!(matches!(err, Error::CleanupFailed { .. }));
        client.delete_deployment("").await.unwrap();

        assert_eq!(*deleted.lock().unwrap(), vec!["abc-123", "gone", "stuck"]);
    }

    #[tokio::test]
    async fn fetch_deployment_keeps_outputs_out_of_the_log() {
        let app = Router::new().route(
            &format!("{BASE_PATH}/:id"),
            get(|| async {
                r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"22","username":"u","password":"TOPSECRET"}"#
            }),
        );
        let client = OrchestratorClient::new(spawn_server(app).await);

        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let deployment = client.fetch_deployment("abc").await.unwrap();

        assert_eq!(deployment.output("password"), Some("TOPSECRET"));
        let output = logs.contents();
        assert!(output.contains("Deployment abc has status 'CREATE_COMPLETE'"));
        assert!(!output.contains("TOPSECRET"));
    }
}
