//! Deployment documents returned by the orchestrator and the access
//! credentials extracted from them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::config::OutputKeys;
use crate::{Error, Result};

/// Status sentinel reported while the orchestrator is still creating resources
pub const STATUS_IN_PROGRESS: &str = "CREATE_IN_PROGRESS";
/// Status sentinel reported once the resources are ready
pub const STATUS_COMPLETE: &str = "CREATE_COMPLETE";

/// Status of a deployment as seen by this crate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentStatus {
    /// Resources are still being created
    InProgress,
    /// Resources are ready
    Complete,
    /// Any other terminal status, kept verbatim
    Failed(String),
}

impl DeploymentStatus {
    /// Map a raw orchestrator status string
    pub fn parse(raw: &str) -> Self {
        match raw {
            STATUS_IN_PROGRESS => Self::InProgress,
            STATUS_COMPLETE => Self::Complete,
            other => Self::Failed(other.to_string()),
        }
    }

    /// The orchestrator's spelling of this status
    pub fn as_str(&self) -> &str {
        match self {
            Self::InProgress => STATUS_IN_PROGRESS,
            Self::Complete => STATUS_COMPLETE,
            Self::Failed(raw) => raw,
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deployment tracked by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    /// Orchestrator assigned id
    pub id: String,
    /// Last observed status
    pub status: DeploymentStatus,
    /// Deployment outputs by name
    pub outputs: BTreeMap<String, String>,
}

impl Deployment {
    /// A freshly created deployment with no outputs yet
    pub fn in_progress(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: DeploymentStatus::InProgress,
            outputs: BTreeMap::new(),
        }
    }

    /// Parse the body of a "create deployment" response.
    ///
    /// Only `uuid` is read; the deployment starts out in progress.
    pub fn from_creation_document(body: &str) -> Result<Self> {
        let doc = parse_document("new deployment", body)?;
        let id = doc
            .get("uuid")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::ResponseUnparsable {
                context: "new deployment".to_string(),
                body: body.to_string(),
                reason: "missing 'uuid' field".to_string(),
            })?;
        Ok(Self::in_progress(id))
    }

    /// Parse the body of a "get deployment" response.
    ///
    /// Outputs are collected from scalar top-level fields and from a nested
    /// `outputs` object; nested values win on conflicts.
    pub fn from_status_document(id: &str, body: &str) -> Result<Self> {
        let doc = parse_document(id, body)?;
        let status = doc
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::ResponseUnparsable {
                context: id.to_string(),
                body: body.to_string(),
                reason: "missing 'status' field".to_string(),
            })?;

        let mut outputs = BTreeMap::new();
        for (key, value) in &doc {
            if key == "uuid" || key == "status" || key == "outputs" {
                continue;
            }
            if let Some(text) = scalar_to_string(value) {
                outputs.insert(key.clone(), text);
            }
        }
        if let Some(Value::Object(nested)) = doc.get("outputs") {
            for (key, value) in nested {
                let text = scalar_to_string(value).unwrap_or_else(|| value.to_string());
                outputs.insert(key.clone(), text);
            }
        }

        Ok(Self {
            id: id.to_string(),
            status: DeploymentStatus::parse(status),
            outputs,
        })
    }

    /// Look up an output by name
    pub fn output(&self, name: &str) -> Option<&str> {
        self.outputs.get(name).map(String::as_str)
    }
}

fn parse_document(context: &str, body: &str) -> Result<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(Error::ResponseUnparsable {
            context: context.to_string(),
            body: body.to_string(),
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(Error::ResponseUnparsable {
            context: context.to_string(),
            body: body.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Remote access point of a provisioned resource
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredentials {
    /// Host name or address
    pub host: String,
    /// Access port
    pub port: u16,
    /// Login name
    pub username: String,
    /// Login password
    pub password: String,
}

impl AccessCredentials {
    /// Create credentials from their parts
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Extract credentials from a completed deployment's outputs
    pub fn from_deployment(deployment: &Deployment, keys: &OutputKeys) -> Result<Self> {
        let lookup = |name: &str| {
            deployment
                .output(name)
                .map(str::to_string)
                .ok_or_else(|| Error::MissingOutput {
                    deployment_id: deployment.id.clone(),
                    output: name.to_string(),
                    reason: "not present".to_string(),
                })
        };

        let host = lookup(&keys.host)?;
        let raw_port = lookup(&keys.port)?;
        let port = raw_port.trim().parse::<u16>().map_err(|e| Error::MissingOutput {
            deployment_id: deployment.id.clone(),
            output: keys.port.clone(),
            reason: format!("'{raw_port}' is not a port: {e}"),
        })?;

        Ok(Self {
            host,
            port,
            username: lookup(&keys.username)?,
            password: lookup(&keys.password)?,
        })
    }
}

impl fmt::Debug for AccessCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(DeploymentStatus::parse("CREATE_IN_PROGRESS"), DeploymentStatus::InProgress);
        assert_eq!(DeploymentStatus::parse("CREATE_COMPLETE"), DeploymentStatus::Complete);
        assert_eq!(
            DeploymentStatus::parse("CREATE_FAILED"),
            DeploymentStatus::Failed("CREATE_FAILED".to_string())
        );
        assert_eq!(DeploymentStatus::parse("UNKNOWN").as_str(), "UNKNOWN");
    }

    #[test]
    fn test_creation_document() {
        let deployment = Deployment::from_creation_document(r#"{"uuid":"abc-123"}"#).unwrap();
        assert_eq!(deployment.id, "abc-123");
        assert_eq!(deployment.status, DeploymentStatus::InProgress);

        let err = Deployment::from_creation_document(r#"{"status":"CREATE_IN_PROGRESS"}"#).unwrap_err();
        assert!(matches!(err, Error::ResponseUnparsable { .. }));

        let err = Deployment::from_creation_document("<html>oops</html>").unwrap_err();
        assert!(err.to_string().contains("<html>oops</html>"));
    }

    #[test]
    fn test_status_document_with_top_level_outputs() {
        let body = r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"22","username":"u","password":"p"}"#;
        let deployment = Deployment::from_status_document("abc-123", body).unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Complete);
        assert_eq!(deployment.output("host"), Some("10.0.0.5"));
        assert_eq!(deployment.output("port"), Some("22"));
        assert_eq!(deployment.output("status"), None);
    }

    #[test]
    fn test_status_document_with_nested_outputs() {
        let body = r#"{
            "uuid": "abc-123",
            "status": "CREATE_COMPLETE",
            "host": "ignored",
            "outputs": {"host": "10.0.0.7", "port": 2222, "creds": {"user": "x"}}
        }"#;
        let deployment = Deployment::from_status_document("abc-123", body).unwrap();
        assert_eq!(deployment.output("host"), Some("10.0.0.7"));
        assert_eq!(deployment.output("port"), Some("2222"));
        assert_eq!(deployment.output("creds"), Some(r#"{"user":"x"}"#));
    }

    #[test]
    fn test_status_document_without_status_is_unparsable() {
        let err = Deployment::from_status_document("abc-123", r#"{"uuid":"abc-123"}"#).unwrap_err();
        assert!(matches!(err, Error::ResponseUnparsable { .. }));
        let err = Deployment::from_status_document("abc-123", r#"{"status": "CREATE_"#).unwrap_err();
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn test_credentials_from_outputs() {
        let body = r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"22","username":"u","password":"p"}"#;
        let deployment = Deployment::from_status_document("abc-123", body).unwrap();
        let creds = AccessCredentials::from_deployment(&deployment, &OutputKeys::default()).unwrap();
        assert_eq!(creds, AccessCredentials::new("10.0.0.5", 22, "u", "p"));
    }

    #[test]
    fn test_credentials_require_every_output() {
        let body = r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"ssh","username":"u","password":"p"}"#;
        let deployment = Deployment::from_status_document("abc-123", body).unwrap();
        let err = AccessCredentials::from_deployment(&deployment, &OutputKeys::default()).unwrap_err();
        assert!(matches!(err, Error::MissingOutput { ref output, .. } if output == "port"));

        let body = r#"{"status":"CREATE_COMPLETE","host":"10.0.0.5","port":"22","username":"u"}"#;
        let deployment = Deployment::from_status_document("abc-123", body).unwrap();
        let err = AccessCredentials::from_deployment(&deployment, &OutputKeys::default()).unwrap_err();
        assert!(matches!(err, Error::MissingOutput { ref output, .. } if output == "password"));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = AccessCredentials::new("10.0.0.5", 22, "u", "s3cret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("10.0.0.5"));
    }
}
