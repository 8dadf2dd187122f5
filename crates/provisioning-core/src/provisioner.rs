//! Two-phase provisioning: create a deployment, wait for it, and extract the
//! access credentials from its outputs.

use serde::Serialize;
use tracing::{error, info};

use crate::cleanup::{CleanupCoordinator, Release};
use crate::config::{PollPolicy, ProvisionerConfig};
use crate::deployment::{AccessCredentials, Deployment};
use crate::orchestrator::OrchestratorApi;
use crate::poller::{DeploymentPoller, ProvisioningOutcome};
use crate::{Error, Result};

/// A ready deployment together with its access point
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProvisionedResource {
    /// The completed deployment
    pub deployment: Deployment,
    /// Credentials extracted from its outputs
    pub credentials: AccessCredentials,
}

/// Creates and releases deployments through an orchestrator
pub struct Provisioner<O> {
    orchestrator: O,
    config: ProvisionerConfig,
}

impl<O: OrchestratorApi> Provisioner<O> {
    /// Create a provisioner
    pub fn new(orchestrator: O, config: ProvisionerConfig) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ProvisionerConfig {
        &self.config
    }

    /// Underlying orchestrator
    pub fn orchestrator(&self) -> &O {
        &self.orchestrator
    }

    /// Provision using the configured poll policy
    pub async fn provision(&self) -> Result<ProvisionedResource> {
        self.provision_with_policy(self.config.poll).await
    }

    /// Provision using an explicit poll policy.
    ///
    /// Any failure releases whatever deployment was created before the
    /// error is returned.
    pub async fn provision_with_policy(&self, policy: PollPolicy) -> Result<ProvisionedResource> {
        let mut deployment_id = None;
        match self.try_provision(policy, &mut deployment_id).await {
            Ok(resource) => Ok(resource),
            Err(e) => {
                error!("Provisioning failed: {}", e.summary());
                self.release(deployment_id.as_deref()).await;
                Err(e)
            }
        }
    }

    async fn try_provision(
        &self,
        policy: PollPolicy,
        deployment_id: &mut Option<String>,
    ) -> Result<ProvisionedResource> {
        let template = self
            .config
            .template
            .as_deref()
            .ok_or_else(|| Error::config("no deployment template configured"))?;

        info!("Creating a new deployment from {}", template.display());
        let deployment = self.orchestrator.create_deployment(template).await?;
        *deployment_id = Some(deployment.id.clone());

        let deployment = self.wait_for(&deployment.id, policy).await.into_result()?;
        let credentials = AccessCredentials::from_deployment(&deployment, &self.config.outputs)?;
        info!(
            "Deployment {} reachable at {}@{}:{}",
            deployment.id, credentials.username, credentials.host, credentials.port
        );

        Ok(ProvisionedResource {
            deployment,
            credentials,
        })
    }

    /// Poll an existing deployment until it is ready, failed or timed out
    pub async fn wait_for(&self, deployment_id: &str, policy: PollPolicy) -> ProvisioningOutcome {
        DeploymentPoller::new(&self.orchestrator, policy)
            .wait(deployment_id)
            .await
    }

    /// Best-effort deletion of a deployment
    pub async fn release(&self, deployment_id: Option<&str>) -> Release {
        CleanupCoordinator::new(&self.orchestrator)
            .release(deployment_id)
            .await
    }
}
