//! Composite job identifiers.
//!
//! The native job id handed to callers is the only place provisioning state
//! survives between calls. It packs the backend job id together with the
//! deployment id and the access credentials of the provisioned host:
//!
//! ```text
//! tosca:<delegate>:<deployment>:<host>:<port>:<username>:<password>
//! ```
//!
//! Every field except the marker and the port is base64 encoded with the
//! URL-safe alphabet, which never contains `:`, so decoding is unambiguous no
//! matter what the backend id or the password contain.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt;
use std::str::FromStr;

use crate::deployment::AccessCredentials;
use crate::{Error, Result};

/// Leading marker of every composite job id
pub const JOB_ID_MARKER: &str = "tosca";

const SEPARATOR: char = ':';
const FIELD_COUNT: usize = 7;

/// Decoded form of a composite job id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeJobId {
    /// Job id assigned by the remote backend
    pub delegate_job_id: String,
    /// Deployment the job runs on
    pub deployment_id: String,
    /// Access point of that deployment
    pub credentials: AccessCredentials,
}

impl CompositeJobId {
    /// Assemble a composite id
    pub fn new(
        delegate_job_id: impl Into<String>,
        deployment_id: impl Into<String>,
        credentials: AccessCredentials,
    ) -> Self {
        Self {
            delegate_job_id: delegate_job_id.into(),
            deployment_id: deployment_id.into(),
            credentials,
        }
    }

    /// Serialize to the native job id string
    pub fn encode(&self) -> String {
        let fields = [
            JOB_ID_MARKER.to_string(),
            URL_SAFE_NO_PAD.encode(&self.delegate_job_id),
            URL_SAFE_NO_PAD.encode(&self.deployment_id),
            URL_SAFE_NO_PAD.encode(&self.credentials.host),
            self.credentials.port.to_string(),
            URL_SAFE_NO_PAD.encode(&self.credentials.username),
            URL_SAFE_NO_PAD.encode(&self.credentials.password),
        ];
        fields.join(&SEPARATOR.to_string())
    }

    /// Parse a native job id string
    pub fn decode(native: &str) -> Result<Self> {
        let fields: Vec<&str> = native.split(SEPARATOR).collect();
        if fields.len() != FIELD_COUNT {
            return Err(Error::malformed_job_id(format!(
                "expected {} fields, found {}",
                FIELD_COUNT,
                fields.len()
            )));
        }
        if fields[0] != JOB_ID_MARKER {
            return Err(Error::malformed_job_id(format!(
                "missing '{}' marker",
                JOB_ID_MARKER
            )));
        }

        let port = fields[4]
            .parse::<u16>()
            .map_err(|_| Error::malformed_job_id("port field is not a valid port"))?;

        Ok(Self {
            delegate_job_id: decode_field("delegate job id", fields[1])?,
            deployment_id: decode_field("deployment id", fields[2])?,
            credentials: AccessCredentials {
                host: decode_field("host", fields[3])?,
                port,
                username: decode_field("username", fields[5])?,
                password: decode_field("password", fields[6])?,
            },
        })
    }
}

fn decode_field(name: &str, raw: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(raw)
        .map_err(|e| Error::malformed_job_id(format!("{name} field is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::malformed_job_id(format!("{name} field is not valid UTF-8")))
}

impl fmt::Display for CompositeJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for CompositeJobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}
