use anyhow::{Context, Result};
use provisioning_core::{OrchestratorApi, ProvisionerConfig};
use serde_json::json;

use super::client;

pub async fn run(config: ProvisionerConfig, deployment_id: &str) -> Result<()> {
    let deployment = client(&config)
        .fetch_deployment(deployment_id)
        .await
        .with_context(|| format!("Failed to fetch deployment {deployment_id}"))?;

    let mut outputs = deployment.outputs.clone();
    if let Some(password) = outputs.get_mut(&config.outputs.password) {
        *password = "<redacted>".to_string();
    }

    let output = json!({
        "deployment_id": deployment.id,
        "status": deployment.status.as_str(),
        "outputs": outputs,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
