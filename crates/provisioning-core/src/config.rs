//! Configuration for the orchestrator client, the provisioning poll loop and
//! the delegation layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::Result;

/// Attribute naming the deployment template file
pub const ATTR_TEMPLATE: &str = "tosca_template";
/// Attribute overriding the poll interval in milliseconds
pub const ATTR_WAIT_MS: &str = "tosca_wait_ms";
/// Attribute overriding the poll attempt ceiling
pub const ATTR_MAX_WAITS: &str = "tosca_max_waits";
/// Attribute naming the orchestrator host
pub const ATTR_ORCHESTRATOR_HOST: &str = "orchestrator_host";
/// Attribute naming the orchestrator port
pub const ATTR_ORCHESTRATOR_PORT: &str = "orchestrator_port";
/// Attribute carrying the orchestrator bearer token
pub const ATTR_TOKEN: &str = "token";
/// Attribute naming the notification endpoint host
pub const ATTR_NOTIFY_HOST: &str = "notify_host";
/// Attribute naming the notification endpoint port
pub const ATTR_NOTIFY_PORT: &str = "notify_port";

/// Complete provisioner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    /// Where the orchestrator lives
    #[serde(default)]
    pub orchestrator: OrchestratorEndpoint,
    /// Deployment template submitted on every provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<PathBuf>,
    /// Readiness polling policy
    #[serde(default)]
    pub poll: PollPolicy,
    /// Names of the deployment outputs carrying access credentials
    #[serde(default)]
    pub outputs: OutputKeys,
    /// URI schemes used by staging results
    #[serde(default)]
    pub staging: StagingSchemes,
    /// Callback endpoint for orchestrator notifications (reserved)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationEndpoint>,
}

/// Orchestrator deployment collection endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorEndpoint {
    /// URL scheme
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// Orchestrator host
    #[serde(default = "default_host")]
    pub host: String,
    /// Orchestrator port
    #[serde(default = "default_orchestrator_port")]
    pub port: u16,
    /// Path of the deployment collection
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Bearer token passed through to the orchestrator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_orchestrator_port() -> u16 {
    80
}

fn default_base_path() -> String {
    "/orchestrator/deployments".to_string()
}

impl Default for OrchestratorEndpoint {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            host: default_host(),
            port: default_orchestrator_port(),
            base_path: default_base_path(),
            token: None,
        }
    }
}

impl OrchestratorEndpoint {
    /// Endpoint at `host:port` with the default scheme and path
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the collection path
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// URL of the deployment collection
    pub fn url(&self) -> String {
        let path = self.base_path.trim_end_matches('/');
        let separator = if path.is_empty() || path.starts_with('/') { "" } else { "/" };
        format!("{}://{}:{}{}{}", self.scheme, self.host, self.port, separator, path)
    }

    /// URL of a single deployment
    pub fn deployment_url(&self, id: &str) -> String {
        format!("{}/{}", self.url(), id)
    }
}

/// How long and how often to poll for deployment readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Pause before every status fetch, in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Maximum number of status fetches
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_interval_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    20
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl PollPolicy {
    /// Policy with an explicit interval and ceiling
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            max_attempts,
        }
    }

    /// Pause before each fetch
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on the time a full poll loop can take
    pub fn max_wait(&self) -> Duration {
        self.interval() * self.max_attempts
    }
}

/// Output names holding the access credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputKeys {
    /// Output holding the host address
    #[serde(default = "default_host_key")]
    pub host: String,
    /// Output holding the port
    #[serde(default = "default_port_key")]
    pub port: String,
    /// Output holding the login name
    #[serde(default = "default_username_key")]
    pub username: String,
    /// Output holding the password
    #[serde(default = "default_password_key")]
    pub password: String,
}

fn default_host_key() -> String {
    "host".to_string()
}

fn default_port_key() -> String {
    "port".to_string()
}

fn default_username_key() -> String {
    "username".to_string()
}

fn default_password_key() -> String {
    "password".to_string()
}

impl Default for OutputKeys {
    fn default() -> Self {
        Self {
            host: default_host_key(),
            port: default_port_key(),
            username: default_username_key(),
            password: default_password_key(),
        }
    }
}

/// Staging URI schemes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingSchemes {
    /// Scheme the remote backend uses for transfers
    #[serde(default = "default_delegate_scheme")]
    pub delegate: String,
    /// Scheme handed back to callers
    #[serde(default = "default_logical_scheme")]
    pub logical: String,
}

fn default_delegate_scheme() -> String {
    "sftp".to_string()
}

fn default_logical_scheme() -> String {
    "tosca".to_string()
}

impl Default for StagingSchemes {
    fn default() -> Self {
        Self {
            delegate: default_delegate_scheme(),
            logical: default_logical_scheme(),
        }
    }
}

/// Notification callback endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEndpoint {
    /// Callback host
    pub host: String,
    /// Callback port
    #[serde(default = "default_notify_port")]
    pub port: u16,
}

fn default_notify_port() -> u16 {
    8888
}

impl ProvisionerConfig {
    /// Load configuration from a YAML (`.yaml`/`.yml`) or JSON file
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;

        if matches!(path.extension().and_then(|s| s.to_str()), Some("yaml" | "yml")) {
            Ok(serde_yaml::from_str(&contents)?)
        } else {
            Ok(serde_json::from_str(&contents)?)
        }
    }

    /// Set the template path
    pub fn with_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the poll policy
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Overlay values from an adaptor attribute map.
    ///
    /// Unknown keys are ignored. Numeric values that do not parse are logged
    /// and leave the current value in place.
    pub fn apply_attributes(&mut self, attributes: &HashMap<String, String>) {
        let get = |key: &str| attributes.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        if let Some(template) = get(ATTR_TEMPLATE) {
            self.template = Some(PathBuf::from(template));
        }
        if let Some(raw) = get(ATTR_WAIT_MS) {
            parse_or_keep(ATTR_WAIT_MS, raw, &mut self.poll.interval_ms);
        }
        if let Some(raw) = get(ATTR_MAX_WAITS) {
            parse_or_keep(ATTR_MAX_WAITS, raw, &mut self.poll.max_attempts);
        }
        if let Some(host) = get(ATTR_ORCHESTRATOR_HOST) {
            self.orchestrator.host = host.to_string();
        }
        if let Some(raw) = get(ATTR_ORCHESTRATOR_PORT) {
            parse_or_keep(ATTR_ORCHESTRATOR_PORT, raw, &mut self.orchestrator.port);
        }
        if let Some(token) = get(ATTR_TOKEN) {
            self.orchestrator.token = Some(token.to_string());
        }
        if let Some(host) = get(ATTR_NOTIFY_HOST) {
            let endpoint = self.notification.get_or_insert_with(|| NotificationEndpoint {
                host: String::new(),
                port: default_notify_port(),
            });
            endpoint.host = host.to_string();
        }
        if let Some(raw) = get(ATTR_NOTIFY_PORT) {
            match self.notification.as_mut() {
                Some(endpoint) => parse_or_keep(ATTR_NOTIFY_PORT, raw, &mut endpoint.port),
                None => warn!("Ignoring '{}' without '{}'", ATTR_NOTIFY_PORT, ATTR_NOTIFY_HOST),
            }
        }
    }
}

fn parse_or_keep<T>(key: &str, raw: &str, slot: &mut T)
where
    T: FromStr + std::fmt::Display,
{
    match raw.parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Invalid {} value: '{}', keeping {}", key, raw, slot),
    }
}
