//! Adapters for the deployment pipeline.

mod template;
mod workspace;

pub use template::TemplateSourceGenerator;
pub use workspace::{MaterializedFile, SourceWorkspace, WorkspaceError};
