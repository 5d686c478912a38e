//! Compensating cleanup for a failed deployment.

use crate::catalog::ports::{CatalogError, CatalogRepository};
use crate::connection::services::ConnectionManager;
use crate::deployment::adapters::SourceWorkspace;
use crate::deployment::domain::DeploymentState;
use std::fmt;
use tracing::{debug, info, warn};

/// What a rollback undid and what it could not undo.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Compensations that succeeded, in execution order.
    pub completed: Vec<String>,
    /// Compensations that failed, with the reason.
    pub failures: Vec<String>,
}

impl RollbackReport {
    /// Returns whether every attempted compensation succeeded.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn completed(&mut self, action: String) {
        info!(action = %action, "rollback step completed");
        self.completed.push(action);
    }

    fn failed(&mut self, failure: String) {
        warn!(failure = %failure, "rollback step failed");
        self.failures.push(failure);
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.completed.is_empty() {
            formatter.write_str("nothing to roll back")?;
        } else {
            write!(formatter, "rolled back: {}", self.completed.join("; "))?;
        }
        if !self.failures.is_empty() {
            write!(formatter, "; rollback failures: {}", self.failures.join("; "))?;
        }
        Ok(())
    }
}

/// Undoes a deployment's side effects in reverse order of creation.
///
/// Order: tracked processes, permanent session, catalog record, throwaway
/// session, generated file. Each compensation runs only when its state flag
/// is set, clears the flag on success, and never stops the ones after it.
pub struct RollbackCoordinator<'a, R>
where
    R: CatalogRepository + ?Sized,
{
    connections: &'a ConnectionManager,
    repository: &'a R,
    workspace: &'a SourceWorkspace,
}

impl<'a, R> RollbackCoordinator<'a, R>
where
    R: CatalogRepository + ?Sized,
{
    /// Creates a coordinator over the deployment's collaborators.
    #[must_use]
    pub const fn new(
        connections: &'a ConnectionManager,
        repository: &'a R,
        workspace: &'a SourceWorkspace,
    ) -> Self {
        Self {
            connections,
            repository,
            workspace,
        }
    }

    /// Runs every applicable compensation against `state`.
    pub async fn rollback(&self, state: &mut DeploymentState) -> RollbackReport {
        let mut report = RollbackReport::default();

        let killed = state.processes().kill_all();
        if !killed.killed.is_empty() {
            report.completed(format!("killed {} process(es)", killed.killed.len()));
        }
        for (process, reason) in killed.failed {
            report.failed(format!(
                "could not kill {} (pid {}): {reason}",
                process.label, process.pid
            ));
        }

        if state.server_connected()
            && let Some(name) = state.server_name().cloned()
        {
            match self.connections.disconnect(&name).await {
                Ok(()) => {
                    state.clear_server_connection();
                    report.completed(format!("disconnected server '{name}'"));
                }
                Err(err) => report.failed(format!("could not disconnect '{name}': {err}")),
            }
        }

        if let Some(id) = state.db_server_id() {
            match self.repository.delete(id).await {
                Ok(()) | Err(CatalogError::NotFound(_)) => {
                    state.clear_db_entry();
                    report.completed(format!("deleted catalog record {id}"));
                }
                Err(err) => report.failed(format!("could not delete catalog record {id}: {err}")),
            }
        }

        if let Some(name) = state.test_server_name().cloned() {
            match self.connections.disconnect(&name).await {
                Ok(()) => {
                    state.clear_test_server();
                    report.completed(format!("disconnected test session '{name}'"));
                }
                Err(err) => {
                    report.failed(format!("could not disconnect test session '{name}': {err}"));
                }
            }
        }

        if state.dependencies_installed() {
            debug!("installed packages are shared with other servers and stay in place");
        }

        if let Some(path) = state.file_path().map(ToOwned::to_owned) {
            match self.workspace.remove(&path) {
                Ok(()) => {
                    state.clear_file();
                    report.completed(format!("deleted {path}"));
                }
                Err(err) => report.failed(format!("could not delete {path}: {err}")),
            }
        }

        report
    }
}
