//! Deployment services.

mod companion;
mod environment;
mod error;
mod orchestrator;
mod rollback;

pub use companion::validate_companion;
pub use environment::EnvironmentValidator;
pub use error::{DeploymentError, DeploymentResult};
pub use orchestrator::{DeploymentDependencies, DeploymentOrchestrator};
pub use rollback::{RollbackCoordinator, RollbackReport};
