//! # Provisioning Core
//!
//! Run jobs on hosts that do not exist yet.
//!
//! A submission first asks a TOSCA orchestrator to create a deployment from a
//! template, polls it until it is ready, and extracts the access credentials
//! of the new host from its outputs. The job is then handed to a remote
//! execution backend (typically SSH) connected with those credentials.
//!
//! The returned job id packs everything later calls need, so the
//! [`JobController`] is stateless between calls: start, cancel, clean,
//! staging and monitoring all decode it, reconnect and forward. Cancelling or
//! cleaning a job releases its deployment.
//!
//! ## Example
//!
//! ```rust,no_run
//! use provisioning_core::{OrchestratorClient, OrchestratorEndpoint, Provisioner, ProvisionerConfig};
//!
//! # async fn example() -> provisioning_core::Result<()> {
//! let config = ProvisionerConfig::default().with_template("templates/ssh-host.yaml");
//! let client = OrchestratorClient::new(OrchestratorEndpoint::new("orchestrator.local", 8080));
//! let provisioner = Provisioner::new(client, config);
//!
//! let resource = provisioner.provision().await?;
//! println!("{}:{}", resource.credentials.host, resource.credentials.port);
//!
//! provisioner.release(Some(&resource.deployment.id)).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cleanup;
pub mod config;
pub mod controller;
pub mod delegate;
pub mod deployment;
pub mod error;
pub mod job_id;
mod monitor;
pub mod orchestrator;
pub mod poller;
pub mod provisioner;
pub mod runtime;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use cleanup::{CleanupCoordinator, Release};
pub use config::{
    NotificationEndpoint, OrchestratorEndpoint, OutputKeys, PollPolicy, ProvisionerConfig,
    StagingSchemes,
};
pub use controller::JobController;
pub use delegate::{
    DelegateError, DelegateResult, JobState, JobStatus, RemoteBackend, RemoteSession,
    StagingTransfer, rewrite_scheme,
};
pub use deployment::{AccessCredentials, Deployment, DeploymentStatus};
pub use error::{Error, FailureCategory, Result};
pub use job_id::{CompositeJobId, JOB_ID_MARKER};
pub use orchestrator::{OrchestratorApi, OrchestratorClient};
pub use poller::{DeploymentPoller, ProvisioningOutcome};
pub use provisioner::{ProvisionedResource, Provisioner};
