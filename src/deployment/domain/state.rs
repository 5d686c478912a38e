//! Per-deployment record of side effects that may need undoing.

use crate::catalog::domain::{CatalogServerId, OwnerId};
use crate::connection::domain::ServerName;
use crate::process::ProcessTracker;
use camino::{Utf8Path, Utf8PathBuf};

/// Mutable record of what one deployment has created so far.
///
/// Each associated value is present exactly while the resource it names
/// exists, so the presence checks double as the rollback flags.
#[derive(Debug)]
pub struct DeploymentState {
    owner: OwnerId,
    file_path: Option<Utf8PathBuf>,
    dependencies_installed: bool,
    test_server_name: Option<ServerName>,
    db_server_id: Option<CatalogServerId>,
    server_name: Option<ServerName>,
    server_connected: bool,
    processes: ProcessTracker,
}

impl DeploymentState {
    /// Creates an empty state for `owner`.
    #[must_use]
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            file_path: None,
            dependencies_installed: false,
            test_server_name: None,
            db_server_id: None,
            server_name: None,
            server_connected: false,
            processes: ProcessTracker::new(),
        }
    }

    /// Returns the requesting owner.
    #[must_use]
    pub const fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Returns the tracker of processes this deployment spawned.
    #[must_use]
    pub const fn processes(&self) -> &ProcessTracker {
        &self.processes
    }

    /// Records a source file this deployment created.
    pub fn mark_file_created(&mut self, path: Utf8PathBuf) {
        self.file_path = Some(path);
    }

    /// Forgets the created file, returning its path.
    pub const fn clear_file(&mut self) -> Option<Utf8PathBuf> {
        self.file_path.take()
    }

    /// Returns `true` while a file created by this deployment exists.
    #[must_use]
    pub const fn file_created(&self) -> bool {
        self.file_path.is_some()
    }

    /// Returns the created file's path.
    #[must_use]
    pub fn file_path(&self) -> Option<&Utf8Path> {
        self.file_path.as_deref()
    }

    /// Records that dependency installation finished.
    pub const fn mark_dependencies_installed(&mut self) {
        self.dependencies_installed = true;
    }

    /// Returns `true` once dependencies are installed.
    #[must_use]
    pub const fn dependencies_installed(&self) -> bool {
        self.dependencies_installed
    }

    /// Records the throwaway validation session.
    pub fn mark_test_server_connected(&mut self, name: ServerName) {
        self.test_server_name = Some(name);
    }

    /// Forgets the throwaway session, returning its name.
    pub const fn clear_test_server(&mut self) -> Option<ServerName> {
        self.test_server_name.take()
    }

    /// Returns `true` while the throwaway session is open.
    #[must_use]
    pub const fn test_server_connected(&self) -> bool {
        self.test_server_name.is_some()
    }

    /// Returns the throwaway session name.
    #[must_use]
    pub const fn test_server_name(&self) -> Option<&ServerName> {
        self.test_server_name.as_ref()
    }

    /// Records the persisted catalog entry and its final name.
    pub fn mark_db_entry_created(&mut self, id: CatalogServerId, name: ServerName) {
        self.db_server_id = Some(id);
        self.server_name = Some(name);
    }

    /// Forgets the catalog entry, returning its id.
    pub const fn clear_db_entry(&mut self) -> Option<CatalogServerId> {
        self.db_server_id.take()
    }

    /// Returns `true` while the catalog entry exists.
    #[must_use]
    pub const fn db_entry_created(&self) -> bool {
        self.db_server_id.is_some()
    }

    /// Returns the catalog entry id.
    #[must_use]
    pub const fn db_server_id(&self) -> Option<CatalogServerId> {
        self.db_server_id
    }

    /// Returns the final registered server name.
    #[must_use]
    pub const fn server_name(&self) -> Option<&ServerName> {
        self.server_name.as_ref()
    }

    /// Records that the permanent session is open.
    pub const fn mark_server_connected(&mut self) {
        self.server_connected = true;
    }

    /// Forgets the permanent session, returning its name when it was open.
    pub fn clear_server_connection(&mut self) -> Option<ServerName> {
        if self.server_connected {
            self.server_connected = false;
            self.server_name.clone()
        } else {
            None
        }
    }

    /// Returns `true` while the permanent session is open.
    #[must_use]
    pub const fn server_connected(&self) -> bool {
        self.server_connected
    }
}
