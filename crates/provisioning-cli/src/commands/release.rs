use anyhow::{Result, bail};
use provisioning_core::{CompositeJobId, JOB_ID_MARKER, ProvisionerConfig, Provisioner, Release};

use super::client;

/// Deployment id behind a deployment id or a composite job id
fn deployment_id(id: &str) -> Result<String> {
    if id.starts_with(&format!("{JOB_ID_MARKER}:")) {
        Ok(CompositeJobId::decode(id)?.deployment_id)
    } else {
        Ok(id.to_string())
    }
}

pub async fn run(config: ProvisionerConfig, id: &str) -> Result<()> {
    let deployment_id = deployment_id(id)?;
    let provisioner = Provisioner::new(client(&config), config);

    match provisioner.release(Some(&deployment_id)).await {
        Release::Deleted => {
            println!("Released deployment {deployment_id}");
            Ok(())
        }
        Release::Skipped => bail!("No deployment id given"),
        Release::Failed(reason) => bail!("Failed to release deployment {deployment_id}: {reason}"),
    }
}
