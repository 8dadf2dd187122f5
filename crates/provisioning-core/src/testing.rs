//! Test doubles for the orchestrator and the remote backend.
//!
//! Enabled for this crate's own tests and, through the `test-utils`
//! feature, for downstream crates.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::delegate::{
    DelegateError, DelegateResult, JobState, JobStatus, RemoteBackend, RemoteSession,
    StagingTransfer,
};
use crate::deployment::{AccessCredentials, Deployment};
use crate::orchestrator::OrchestratorApi;
use crate::{Error, Result};

/// Log output captured from a thread-local `tracing` subscriber
#[cfg(test)]
#[derive(Clone, Default)]
pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedLogs {
    /// Capture everything down to DEBUG on this thread until the guard drops
    pub(crate) fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(test)]
impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One scripted answer to a deployment fetch
#[derive(Debug, Clone)]
pub enum StatusReply {
    /// Respond with this raw body
    Document(String),
    /// Fail as if the orchestrator could not be reached
    Unreachable,
}

impl StatusReply {
    /// `{"status": <status>}`
    pub fn status(status: &str) -> Self {
        Self::Document(serde_json::json!({ "status": status }).to_string())
    }

    /// A completed deployment carrying access outputs
    pub fn complete(host: &str, port: &str, username: &str, password: &str) -> Self {
        Self::Document(
            serde_json::json!({
                "status": "CREATE_COMPLETE",
                "host": host,
                "port": port,
                "username": username,
                "password": password,
            })
            .to_string(),
        )
    }

    /// A verbatim body, parsable or not
    pub fn raw(body: &str) -> Self {
        Self::Document(body.to_string())
    }

    /// A transport failure
    pub fn unreachable() -> Self {
        Self::Unreachable
    }
}

type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

#[derive(Default)]
struct OrchestratorState {
    replies: Vec<StatusReply>,
    creates: Vec<String>,
    fetches: usize,
    deletes: Vec<String>,
}

/// In-memory orchestrator that replays scripted status documents
pub struct ScriptedOrchestrator {
    deployment_id: String,
    create_error: Option<ErrorFactory>,
    fail_deletes: bool,
    state: Mutex<OrchestratorState>,
}

impl ScriptedOrchestrator {
    /// Orchestrator that assigns `deployment_id` to the next creation
    pub fn new(deployment_id: impl Into<String>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            create_error: None,
            fail_deletes: false,
            state: Mutex::new(OrchestratorState::default()),
        }
    }

    /// Replies returned by successive fetches; the last one repeats
    pub fn with_replies(self, replies: Vec<StatusReply>) -> Self {
        self.state.lock().unwrap().replies = replies;
        self
    }

    /// Make creation fail after the template was read
    pub fn failing_create(mut self, error: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        self.create_error = Some(Box::new(error));
        self
    }

    /// Make every delete fail
    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    /// Template contents received by each creation
    pub fn created_templates(&self) -> Vec<String> {
        self.state.lock().unwrap().creates.clone()
    }

    /// Number of fetches served
    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    /// Deployment ids passed to delete, in order
    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }
}

#[async_trait]
impl OrchestratorApi for ScriptedOrchestrator {
    async fn create_deployment(&self, template: &Path) -> Result<Deployment> {
        let content = async_fs::read_to_string(template)
            .await
            .map_err(|source| Error::TemplateUnreadable {
                path: template.to_path_buf(),
                source,
            })?;
        self.state.lock().unwrap().creates.push(content);

        if let Some(error) = &self.create_error {
            return Err(error());
        }
        Ok(Deployment::in_progress(self.deployment_id.clone()))
    }

    async fn fetch_deployment(&self, id: &str) -> Result<Deployment> {
        let reply = {
            let mut state = self.state.lock().unwrap();
            let index = state.fetches.min(state.replies.len().saturating_sub(1));
            state.fetches += 1;
            state
                .replies
                .get(index)
                .cloned()
                .unwrap_or_else(|| StatusReply::status("CREATE_IN_PROGRESS"))
        };

        match reply {
            StatusReply::Document(body) => Deployment::from_status_document(id, &body),
            StatusReply::Unreachable => Err(Error::ServiceUnreachable {
                endpoint: format!("scripted://{id}"),
                reason: "connection refused".to_string(),
            }),
        }
    }

    async fn delete_deployment(&self, id: &str) -> Result<()> {
        self.state.lock().unwrap().deletes.push(id.to_string());
        if self.fail_deletes {
            return Err(Error::CleanupFailed {
                deployment_id: id.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct BackendState {
    calls: Vec<String>,
    connect_error: Option<DelegateError>,
    failures: HashMap<String, DelegateError>,
    next_job: u32,
    input_transfers: Vec<StagingTransfer>,
    output_transfers: Vec<StagingTransfer>,
    staging_directory: String,
}

/// Remote backend that records every call it receives
#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<BackendState>>,
}

impl RecordingBackend {
    /// Backend where every call succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `connect` fail
    pub fn failing_connect(self, error: DelegateError) -> Self {
        self.state.lock().unwrap().connect_error = Some(error);
        self
    }

    /// Make the named session operation fail (e.g. `"cancel"`)
    pub fn failing(self, operation: &str, error: DelegateError) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation.to_string(), error);
        self
    }

    /// Transfers returned by the staging queries
    pub fn with_transfers(self, input: Vec<StagingTransfer>, output: Vec<StagingTransfer>) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.input_transfers = input;
            state.output_transfers = output;
        }
        self
    }

    /// Directory returned by the staging directory query
    pub fn with_staging_directory(self, directory: impl Into<String>) -> Self {
        self.state.lock().unwrap().staging_directory = directory.into();
        self
    }

    /// Calls received so far, as `"<operation> <argument>"`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl RemoteBackend for RecordingBackend {
    type Session = RecordingSession;

    async fn connect(
        &self,
        credentials: &AccessCredentials,
        _base_path: Option<&str>,
        _attributes: &HashMap<String, String>,
    ) -> DelegateResult<Self::Session> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!(
            "connect {}:{}@{}:{}",
            credentials.username, credentials.password, credentials.host, credentials.port
        ));
        if let Some(error) = &state.connect_error {
            return Err(error.clone());
        }
        Ok(RecordingSession {
            state: self.state.clone(),
        })
    }
}

/// Session handed out by [`RecordingBackend`]
pub struct RecordingSession {
    state: Arc<Mutex<BackendState>>,
}

impl RecordingSession {
    fn record(&self, operation: &str, argument: &str) -> DelegateResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("{operation} {argument}"));
        match state.failures.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn timestamp(&self, hour: u32) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(2024, 3, 17, hour, 0, 0).single()
    }
}

#[async_trait]
impl RemoteSession for RecordingSession {
    async fn submit(
        &self,
        description: &str,
        _check_match: bool,
        unique_id: &str,
    ) -> DelegateResult<String> {
        self.record("submit", description)?;
        let mut state = self.state.lock().unwrap();
        state.next_job += 1;
        Ok(format!("[ssh]-{}:{}", unique_id, state.next_job))
    }

    async fn start(&self, job_id: &str) -> DelegateResult<()> {
        self.record("start", job_id)
    }

    async fn cancel(&self, job_id: &str) -> DelegateResult<()> {
        self.record("cancel", job_id)
    }

    async fn clean(&self, job_id: &str) -> DelegateResult<()> {
        self.record("clean", job_id)
    }

    async fn input_staging_transfers(&self, job_id: &str) -> DelegateResult<Vec<StagingTransfer>> {
        self.record("input_staging_transfers", job_id)?;
        Ok(self.state.lock().unwrap().input_transfers.clone())
    }

    async fn output_staging_transfers(&self, job_id: &str) -> DelegateResult<Vec<StagingTransfer>> {
        self.record("output_staging_transfers", job_id)?;
        Ok(self.state.lock().unwrap().output_transfers.clone())
    }

    async fn staging_directory(&self, job_id: &str) -> DelegateResult<String> {
        self.record("staging_directory", job_id)?;
        Ok(self.state.lock().unwrap().staging_directory.clone())
    }

    async fn status(&self, job_id: &str) -> DelegateResult<JobStatus> {
        self.record("status", job_id)?;
        Ok(JobStatus {
            job_id: job_id.to_string(),
            state: JobState::Running,
            native_state: Some("R".to_string()),
        })
    }

    async fn created(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>> {
        self.record("created", job_id)?;
        Ok(self.timestamp(8))
    }

    async fn started(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>> {
        self.record("started", job_id)?;
        Ok(self.timestamp(9))
    }

    async fn finished(&self, job_id: &str) -> DelegateResult<Option<DateTime<Utc>>> {
        self.record("finished", job_id)?;
        Ok(None)
    }

    async fn exit_code(&self, job_id: &str) -> DelegateResult<Option<i32>> {
        self.record("exit_code", job_id)?;
        Ok(Some(0))
    }

    async fn execution_hosts(&self, job_id: &str) -> DelegateResult<Vec<String>> {
        self.record("execution_hosts", job_id)?;
        Ok(vec!["10.0.0.5".to_string()])
    }
}
