//! Checks on the peer server a new server depends on.

use super::{DeploymentError, DeploymentResult};
use crate::catalog::ports::CatalogRepository;
use crate::connection::domain::ServerName;
use crate::connection::services::ConnectionManager;

/// Verifies the companion is registered, then enabled, then connected.
///
/// # Errors
///
/// Returns the [`DeploymentError`] companion variant for the first check
/// that fails, or repository errors.
pub async fn validate_companion<R>(
    target: &str,
    repository: &R,
    connections: &ConnectionManager,
) -> DeploymentResult<ServerName>
where
    R: CatalogRepository + ?Sized,
{
    let Ok(name) = ServerName::new(target) else {
        return Err(DeploymentError::CompanionNotRegistered(target.to_owned()));
    };

    let Some(record) = repository.find_by_name(&name).await? else {
        return Err(DeploymentError::CompanionNotRegistered(name.to_string()));
    };
    if !record.enabled() {
        return Err(DeploymentError::CompanionDisabled(name.to_string()));
    }
    if !connections.is_connected(&name).await {
        return Err(DeploymentError::CompanionNotConnected(name.to_string()));
    }
    Ok(name)
}
