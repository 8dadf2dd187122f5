//! Best-effort release of provisioned deployments.

use tracing::{debug, error, warn};

use crate::orchestrator::OrchestratorApi;

/// What a release attempt did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// The orchestrator accepted the delete
    Deleted,
    /// There was no deployment id to release
    Skipped,
    /// The delete failed; the reason was logged
    Failed(String),
}

/// Deletes deployments without ever failing the caller
pub struct CleanupCoordinator<'a, O: ?Sized> {
    orchestrator: &'a O,
}

impl<'a, O: OrchestratorApi + ?Sized> CleanupCoordinator<'a, O> {
    /// Create a coordinator over the given orchestrator
    pub fn new(orchestrator: &'a O) -> Self {
        Self { orchestrator }
    }

    /// Release a deployment if there is one.
    ///
    /// Failures are logged and reported in the returned [`Release`], never
    /// as an error, so they cannot replace whatever triggered the cleanup.
    pub async fn release(&self, deployment_id: Option<&str>) -> Release {
        let Some(id) = deployment_id.filter(|id| !id.is_empty()) else {
            warn!("Called release on a missing or empty deployment id");
            return Release::Skipped;
        };

        debug!("Releasing deployment '{}'", id);
        match self.orchestrator.delete_deployment(id).await {
            Ok(()) => Release::Deleted,
            Err(e) => {
                error!("Failed to release deployment '{}': {}", id, e);
                Release::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedOrchestrator;

    #[smol_potat::test]
    async fn test_release_deletes_once() {
        let orchestrator = ScriptedOrchestrator::new("abc-123");
        let release = CleanupCoordinator::new(&orchestrator).release(Some("abc-123")).await;
        assert_eq!(release, Release::Deleted);
        assert_eq!(orchestrator.deleted(), vec!["abc-123"]);
    }

    #[smol_potat::test]
    async fn test_release_without_id_is_a_noop() {
        let orchestrator = ScriptedOrchestrator::new("abc-123");
        let coordinator = CleanupCoordinator::new(&orchestrator);
        assert_eq!(coordinator.release(None).await, Release::Skipped);
        assert_eq!(coordinator.release(Some("")).await, Release::Skipped);
        assert!(orchestrator.deleted().is_empty());
    }

    #[smol_potat::test]
    async fn test_release_swallows_delete_failures() {
        let orchestrator = ScriptedOrchestrator::new("abc-123").failing_deletes();
        let release = CleanupCoordinator::new(&orchestrator).release(Some("abc-123")).await;
        assert!(matches!(release, Release::Failed(reason) if reason.contains("abc-123")));
    }
}
