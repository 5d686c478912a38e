//! Deployment domain types.
//!
//! Requests and resource descriptors, the progress event model, the
//! per-deployment state record and the error classifier. Nothing here
//! performs I/O.

mod classify;
mod error;
mod events;
mod request;
mod source;
mod state;

pub use classify::{CategorizedError, DependencyKind, ErrorCategory, classify_error};
pub use error::DeploymentDomainError;
pub use events::{
    DeploymentFailure, DeploymentMessage, DeploymentOutcome, DeploymentStep, DeploymentSuccess,
    PipelineStep, StepStatus, TOTAL_STEPS,
};
pub use request::{
    DeploymentRequest, LanguageVariant, PackagingFormat, ParameterSpec, ParameterType,
    ResourceDescriptor, ToolSpec,
};
pub use source::GeneratedSource;
pub use state::DeploymentState;
