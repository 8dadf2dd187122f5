pub mod deploy;
pub mod inspect;
pub mod release;
pub mod status;

use anyhow::{Context, Result};
use provisioning_core::{AccessCredentials, OrchestratorClient, ProvisionerConfig};
use serde_json::{Value, json};
use std::path::Path;

/// Load the configuration file, if any, and apply command-line overrides
pub async fn load_config(
    path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    token: Option<String>,
) -> Result<ProvisionerConfig> {
    let mut config = match path {
        Some(path) => ProvisionerConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => ProvisionerConfig::default(),
    };

    if let Some(host) = host {
        config.orchestrator.host = host;
    }
    if let Some(port) = port {
        config.orchestrator.port = port;
    }
    if token.is_some() {
        config.orchestrator.token = token;
    }
    Ok(config)
}

/// Orchestrator client for the configured endpoint
pub fn client(config: &ProvisionerConfig) -> OrchestratorClient {
    OrchestratorClient::new(config.orchestrator.clone())
}

/// Credentials as JSON, with the password hidden unless asked for
pub fn credentials_json(credentials: &AccessCredentials, show_password: bool) -> Value {
    let password = if show_password {
        credentials.password.as_str()
    } else {
        "<redacted>"
    };
    json!({
        "host": credentials.host,
        "port": credentials.port,
        "username": credentials.username,
        "password": password,
    })
}
