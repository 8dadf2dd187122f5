//! Bounded readiness polling for deployments.

use tracing::{debug, info, warn};

use crate::config::PollPolicy;
use crate::deployment::{Deployment, DeploymentStatus};
use crate::orchestrator::OrchestratorApi;
use crate::runtime;
use crate::{Error, Result};

/// Terminal result of waiting for a deployment
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningOutcome {
    /// The deployment completed; its outputs carry the access credentials
    Ready(Deployment),
    /// The deployment reached a terminal status other than complete
    Failed(Deployment),
    /// The attempt ceiling was reached while still in progress
    TimedOut {
        /// Deployment id
        deployment_id: String,
        /// Number of fetches performed
        attempts: u32,
        /// Last transient failure seen while polling
        last_error: Option<String>,
    },
}

impl ProvisioningOutcome {
    /// Convert into the ready deployment or the matching error
    pub fn into_result(self) -> Result<Deployment> {
        match self {
            Self::Ready(deployment) => Ok(deployment),
            Self::Failed(deployment) => Err(Error::ProvisioningFailed {
                deployment_id: deployment.id,
                status: deployment.status.to_string(),
            }),
            Self::TimedOut {
                deployment_id,
                attempts,
                last_error,
            } => Err(Error::ProvisioningTimeout {
                deployment_id,
                attempts,
                last_error,
            }),
        }
    }
}

/// Waits for a deployment to leave the in-progress state
pub struct DeploymentPoller<'a, O: ?Sized> {
    orchestrator: &'a O,
    policy: PollPolicy,
}

impl<'a, O: OrchestratorApi + ?Sized> DeploymentPoller<'a, O> {
    /// Create a poller using the given policy
    pub fn new(orchestrator: &'a O, policy: PollPolicy) -> Self {
        Self {
            orchestrator,
            policy,
        }
    }

    /// Poll until the deployment completes, fails, or attempts run out.
    ///
    /// Each attempt sleeps for the policy interval and then fetches the
    /// deployment once. Fetch and parse failures are transient: they are
    /// logged and the loop carries on with the status it last saw.
    pub async fn wait(&self, deployment_id: &str) -> ProvisioningOutcome {
        let max_attempts = self.policy.max_attempts;
        let interval = self.policy.interval();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            debug!(
                "Waiting ({:?}) for deployment {}; attempt: {}/{}",
                interval, deployment_id, attempt, max_attempts
            );
            runtime::sleep(interval).await;

            let deployment = match self.orchestrator.fetch_deployment(deployment_id).await {
                Ok(deployment) => deployment,
                Err(e) => {
                    warn!(
                        "Could not read status of deployment {}: {}",
                        deployment_id,
                        e.summary()
                    );
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            debug!("Deployment {} has status '{}'", deployment_id, deployment.status);
            match deployment.status {
                DeploymentStatus::InProgress => continue,
                DeploymentStatus::Complete => {
                    info!("Deployment {} is ready after {} attempts", deployment_id, attempt);
                    return ProvisioningOutcome::Ready(deployment);
                }
                DeploymentStatus::Failed(_) => {
                    warn!(
                        "Deployment {} ended with status '{}' after {} attempts",
                        deployment_id, deployment.status, attempt
                    );
                    return ProvisioningOutcome::Failed(deployment);
                }
            }
        }

        warn!(
            "Deployment {} still in progress after {} attempts",
            deployment_id, max_attempts
        );
        ProvisioningOutcome::TimedOut {
            deployment_id: deployment_id.to_string(),
            attempts: max_attempts,
            last_error,
        }
    }
}
