//! Error types for provisioning and delegated job control

use std::path::PathBuf;
use thiserror::Error;

use crate::delegate::DelegateError;

/// Coarse failure classes expected by job-framework adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// Credentials were rejected by the remote host
    PermissionDenied,
    /// Something did not finish in time
    Timeout,
    /// The operation failed for any other reason
    NoSuccess,
    /// The caller passed something unusable
    BadParameter,
}

/// Unified error type for provisioning and delegation
#[derive(Error, Debug)]
pub enum Error {
    /// The deployment template could not be read
    #[error("template '{}' is not readable: {source}", .path.display())]
    TemplateUnreadable {
        /// Path of the template
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// No connection could be made to the orchestrator
    #[error("connection error with the orchestrator at {endpoint}: {reason}")]
    ServiceUnreachable {
        /// Orchestrator URL that was contacted
        endpoint: String,
        /// Transport failure description
        reason: String,
    },

    /// The orchestrator answered with a status we did not expect
    #[error("orchestrator at {endpoint} answered {status}: '{body}'")]
    UnexpectedStatus {
        /// Orchestrator URL that was contacted
        endpoint: String,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The orchestrator response was not the JSON we expected
    #[error("orchestrator response for {context} not parsable ({reason}): '{body}'")]
    ResponseUnparsable {
        /// Deployment id or endpoint the response belongs to
        context: String,
        /// Raw response body
        body: String,
        /// Parser message
        reason: String,
    },

    /// A completed deployment lacks a usable access output
    #[error("deployment {deployment_id} has no usable '{output}' output: {reason}")]
    MissingOutput {
        /// Deployment id
        deployment_id: String,
        /// Output name that was looked up
        output: String,
        /// What was wrong with it
        reason: String,
    },

    /// The deployment reached a terminal status other than complete
    #[error("deployment {deployment_id} failed with status '{status}'")]
    ProvisioningFailed {
        /// Deployment id
        deployment_id: String,
        /// Raw terminal status reported by the orchestrator
        status: String,
    },

    /// The deployment was still in progress when the poll ceiling was hit
    #[error("reached timeout while waiting for deployment {deployment_id} after {attempts} attempts{}", .last_error.as_ref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    ProvisioningTimeout {
        /// Deployment id
        deployment_id: String,
        /// Number of polls performed
        attempts: u32,
        /// Last transient failure observed while polling
        last_error: Option<String>,
    },

    /// A native job id could not be decoded
    #[error("malformed job id: {reason}")]
    MalformedJobId {
        /// Why decoding failed
        reason: String,
    },

    /// The remote host rejected the decoded credentials
    #[error("authentication to {host} failed: {reason}")]
    DelegateAuthenticationFailed {
        /// Remote host address
        host: String,
        /// Delegate message
        reason: String,
    },

    /// The remote-execution backend could not complete the call
    #[error("remote backend at {host} failed: {source}")]
    DelegateUnavailable {
        /// Remote host address
        host: String,
        /// Delegate failure
        #[source]
        source: DelegateError,
    },

    /// Deleting a deployment failed; only ever logged
    #[error("failed to release deployment {deployment_id}: {reason}")]
    CleanupFailed {
        /// Deployment id
        deployment_id: String,
        /// Failure description
        reason: String,
    },

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML configuration error
    #[error("YAML configuration error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON configuration error
    #[error("JSON configuration error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed job id error
    pub fn malformed_job_id(reason: impl Into<String>) -> Self {
        Self::MalformedJobId {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Classify a delegate failure for the given remote host
    pub fn from_delegate(host: impl Into<String>, source: DelegateError) -> Self {
        let host = host.into();
        match source {
            DelegateError::AuthenticationFailed(reason)
            | DelegateError::AuthorizationFailed(reason) => {
                Self::DelegateAuthenticationFailed { host, reason }
            }
            source => Self::DelegateUnavailable { host, source },
        }
    }

    /// Message for logs.
    ///
    /// Raw orchestrator bodies can carry deployment outputs, passwords
    /// included, so they are left out; the error itself keeps them.
    pub fn summary(&self) -> String {
        match self {
            Error::UnexpectedStatus {
                endpoint, status, ..
            } => format!("orchestrator at {endpoint} answered {status}"),
            Error::ResponseUnparsable {
                context, reason, ..
            } => format!("orchestrator response for {context} not parsable ({reason})"),
            Error::ProvisioningTimeout {
                deployment_id,
                attempts,
                ..
            } => format!(
                "reached timeout while waiting for deployment {deployment_id} after {attempts} attempts"
            ),
            other => other.to_string(),
        }
    }

    /// Map this error onto the coarse framework taxonomy
    pub fn category(&self) -> FailureCategory {
        match self {
            Error::DelegateAuthenticationFailed { .. } => FailureCategory::PermissionDenied,
            Error::DelegateUnavailable {
                source: DelegateError::Timeout(_),
                ..
            }
            | Error::ProvisioningTimeout { .. } => FailureCategory::Timeout,
            Error::MalformedJobId { .. }
            | Error::Config(_)
            | Error::Yaml(_)
            | Error::Json(_) => FailureCategory::BadParameter,
            _ => FailureCategory::NoSuccess,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegate_auth_failures_are_permission_denied() {
        let err = Error::from_delegate("10.0.0.5", DelegateError::AuthenticationFailed("bad password".into()));
        assert!(matches!(err, Error::DelegateAuthenticationFailed { .. }));
        assert_eq!(err.category(), FailureCategory::PermissionDenied);

        let err = Error::from_delegate("10.0.0.5", DelegateError::AuthorizationFailed("denied".into()));
        assert_eq!(err.category(), FailureCategory::PermissionDenied);
    }

    #[test]
    fn test_delegate_timeout_keeps_timeout_category() {
        let err = Error::from_delegate("10.0.0.5", DelegateError::Timeout("no answer".into()));
        assert!(matches!(err, Error::DelegateUnavailable { .. }));
        assert_eq!(err.category(), FailureCategory::Timeout);

        let err = Error::from_delegate("10.0.0.5", DelegateError::NotImplemented("list".into()));
        assert_eq!(err.category(), FailureCategory::NoSuccess);
    }

    #[test]
    fn test_provisioning_errors_are_distinct() {
        let timeout = Error::ProvisioningTimeout {
            deployment_id: "abc".into(),
            attempts: 20,
            last_error: None,
        };
        let failed = Error::ProvisioningFailed {
            deployment_id: "abc".into(),
            status: "CREATE_FAILED".into(),
        };
        assert_eq!(timeout.category(), FailureCategory::Timeout);
        assert_eq!(failed.category(), FailureCategory::NoSuccess);
        assert!(failed.to_string().contains("abc"));
        assert!(failed.to_string().contains("CREATE_FAILED"));
    }

    #[test]
    fn test_timeout_message_includes_last_error() {
        let err = Error::ProvisioningTimeout {
            deployment_id: "abc".into(),
            attempts: 3,
            last_error: Some("status field missing".into()),
        };
        let message = err.to_string();
        assert!(message.contains("after 3 attempts"));
        assert!(message.contains("status field missing"));
    }

    #[test]
    fn test_summary_leaves_out_response_bodies() {
        let body = r#"{"status":"CREATE_COMPLETE","password":"TOPSECRET""#;
        let unparsable = Error::ResponseUnparsable {
            context: "abc".into(),
            body: body.into(),
            reason: "EOF while parsing an object".into(),
        };
        let timeout = Error::ProvisioningTimeout {
            deployment_id: "abc".into(),
            attempts: 2,
            last_error: Some(unparsable.to_string()),
        };

        assert!(unparsable.to_string().contains("TOPSECRET"));
        assert!(timeout.to_string().contains("TOPSECRET"));
        assert!(!unparsable.summary().contains("TOPSECRET"));
        assert!(!timeout.summary().contains("TOPSECRET"));
        assert!(timeout.summary().contains("after 2 attempts"));
    }
}
