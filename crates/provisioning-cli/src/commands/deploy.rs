use anyhow::{Context, Result};
use provisioning_core::{PollPolicy, Provisioner, ProvisionerConfig};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use super::{client, credentials_json};

pub async fn run(
    config: ProvisionerConfig,
    template: PathBuf,
    interval_ms: Option<u64>,
    max_attempts: Option<u32>,
    show_password: bool,
) -> Result<()> {
    let policy = PollPolicy::new(
        interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| config.poll.interval()),
        max_attempts.unwrap_or(config.poll.max_attempts),
    );
    info!(
        "Waiting up to {:?} for the deployment to become ready",
        policy.max_wait()
    );

    let config = config.with_template(template);
    let provisioner = Provisioner::new(client(&config), config);
    let resource = provisioner
        .provision_with_policy(policy)
        .await
        .context("Provisioning failed")?;

    let output = json!({
        "deployment_id": resource.deployment.id,
        "status": resource.deployment.status.as_str(),
        "credentials": credentials_json(&resource.credentials, show_password),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
