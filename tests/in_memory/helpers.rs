//! Shared fixtures for in-memory deployment integration tests.

use async_trait::async_trait;
use camino::Utf8PathBuf;
use mockable::DefaultClock;
use rstest::fixture;
use slipway::catalog::adapters::memory::{InMemoryCatalogRepository, InMemoryOwnershipStore};
use slipway::catalog::domain::{CatalogRecord, CatalogServerId, OwnerId};
use slipway::catalog::ports::{
    CatalogError, CatalogRepository, CatalogResult, OwnershipError, OwnershipResult,
    OwnershipStore,
};
use slipway::config::DeploymentConfig;
use slipway::connection::adapters::{InMemoryToolServers, ToolServerBehaviour};
use slipway::connection::domain::{ConnectionDescriptor, ServerName};
use slipway::connection::services::ConnectionManager;
use slipway::deployment::adapters::TemplateSourceGenerator;
use slipway::deployment::domain::{
    DeploymentMessage, DeploymentOutcome, DeploymentRequest, DeploymentStep, GeneratedSource,
    LanguageVariant, PackagingFormat, ParameterSpec, ParameterType, ResourceDescriptor, ToolSpec,
};
use slipway::deployment::ports::{
    GenerationRequest, GeneratorError, GeneratorResult, SourceGenerator,
};
use slipway::deployment::services::{DeploymentDependencies, DeploymentOrchestrator};
use slipway::process::{ScriptedCommandRunner, ScriptedStartupProbe};
use std::io;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Orchestrator type used with the in-memory catalog.
pub type InMemoryOrchestrator = DeploymentOrchestrator<InMemoryCatalogRepository, DefaultClock>;

/// In-memory collaborators for one deployment test.
pub struct Harness {
    /// Tool-servers behind the connection manager.
    pub servers: InMemoryToolServers,
    /// Shared session registry.
    pub connections: Arc<ConnectionManager>,
    /// Catalog used by the orchestrator.
    pub repository: Arc<InMemoryCatalogRepository>,
    /// Ownership links used by the orchestrator.
    pub ownership: Arc<dyn OwnershipStore>,
    /// Source generator used by the orchestrator.
    pub generator: Arc<dyn SourceGenerator>,
    /// Runner answering version probes and installs.
    pub runner: ScriptedCommandRunner,
    /// Startup prober.
    pub prober: ScriptedStartupProbe,
    /// Output directory for generated sources.
    pub output: TempDir,
}

impl Harness {
    /// Creates a harness whose servers expose one `get_forecast` tool.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary output directory cannot be created.
    pub fn new() -> io::Result<Self> {
        let servers = InMemoryToolServers::new(ToolServerBehaviour::with_tools(["get_forecast"]));
        let connections = Arc::new(ConnectionManager::new(Arc::new(servers.clone())));
        Ok(Self {
            servers,
            connections,
            repository: Arc::new(InMemoryCatalogRepository::new()),
            ownership: Arc::new(InMemoryOwnershipStore::new()),
            generator: Arc::new(TemplateSourceGenerator::default()),
            runner: ScriptedCommandRunner::new(),
            prober: ScriptedStartupProbe::new(),
            output: tempfile::tempdir()?,
        })
    }

    /// Returns the output directory as a UTF-8 path.
    ///
    /// # Errors
    ///
    /// Returns an error when the temporary path is not valid UTF-8.
    pub fn output_dir(&self) -> io::Result<Utf8PathBuf> {
        Utf8PathBuf::from_path_buf(self.output.path().to_path_buf())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non UTF-8 temp dir"))
    }

    /// Builds an orchestrator over the in-memory catalog.
    ///
    /// # Errors
    ///
    /// Returns an error when the output directory path is not valid UTF-8.
    pub fn orchestrator(&self) -> io::Result<InMemoryOrchestrator> {
        self.orchestrator_with(Arc::clone(&self.repository))
    }

    /// Builds an orchestrator over `repository`.
    ///
    /// # Errors
    ///
    /// Returns an error when the output directory path is not valid UTF-8.
    pub fn orchestrator_with<R>(
        &self,
        repository: Arc<R>,
    ) -> io::Result<DeploymentOrchestrator<R, DefaultClock>>
    where
        R: CatalogRepository + 'static,
    {
        let config = DeploymentConfig {
            output_dir: self.output_dir()?,
            ..DeploymentConfig::default()
        };
        Ok(DeploymentOrchestrator::new(DeploymentDependencies {
            repository,
            connections: Arc::clone(&self.connections),
            ownership: Arc::clone(&self.ownership),
            generator: Arc::clone(&self.generator),
            runner: Arc::new(self.runner.clone()),
            prober: Arc::new(self.prober.clone()),
            clock: Arc::new(DefaultClock),
            config,
        }))
    }

    /// Returns the names of the files left in the output directory.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be read.
    pub fn output_files(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.output.path())? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

/// Provides a fresh harness for each test.
///
/// # Errors
///
/// Returns an error when the temporary output directory cannot be created.
#[fixture]
pub fn harness() -> io::Result<Harness> {
    Harness::new()
}

/// Builds a `Weather API` request with one `get_forecast` tool.
#[must_use]
pub fn weather_request(format: PackagingFormat, language: LanguageVariant) -> DeploymentRequest {
    let descriptor = ResourceDescriptor {
        name: "Weather API".to_owned(),
        description: Some("Forecasts by city".to_owned()),
        tools: vec![ToolSpec {
            name: "get_forecast".to_owned(),
            description: "Forecast for a city".to_owned(),
            parameters: vec![ParameterSpec {
                name: "city".to_owned(),
                kind: ParameterType::String,
                description: Some("City name".to_owned()),
                required: true,
            }],
        }],
        target_server: None,
    };
    DeploymentRequest::new(descriptor, format, language, "alice")
}

/// Events and outcome of one pipeline run.
pub struct RunTranscript {
    /// Step events in emission order.
    pub steps: Vec<DeploymentStep>,
    /// Terminal outcomes received; exactly one for a well-formed run.
    pub outcomes: Vec<DeploymentOutcome>,
    /// Outcome returned by `run`.
    pub returned: DeploymentOutcome,
}

impl RunTranscript {
    /// Returns the step events for `step`, in order.
    #[must_use]
    pub fn events_for(&self, step: u8) -> Vec<&DeploymentStep> {
        self.steps.iter().filter(|event| event.step == step).collect()
    }
}

/// Runs `request` to completion and collects every emitted message.
pub async fn run_pipeline<R>(
    orchestrator: &DeploymentOrchestrator<R, DefaultClock>,
    request: DeploymentRequest,
) -> RunTranscript
where
    R: CatalogRepository + 'static,
{
    let (sender, mut receiver) = mpsc::unbounded_channel();
    let returned = orchestrator.run(request, &sender).await;
    drop(sender);

    let mut steps = Vec::new();
    let mut outcomes = Vec::new();
    while let Some(message) = receiver.recv().await {
        match message {
            DeploymentMessage::Step(step) => steps.push(step),
            DeploymentMessage::Finished(outcome) => outcomes.push(outcome),
        }
    }
    RunTranscript {
        steps,
        outcomes,
        returned,
    }
}

/// Stores a record named `name` for `owner` directly in `repository`.
///
/// # Errors
///
/// Returns an error when the name or owner is invalid or the insert fails.
pub async fn seed_record(
    repository: &InMemoryCatalogRepository,
    owner: &str,
    name: &str,
) -> Result<CatalogRecord, Box<dyn std::error::Error + Send + Sync>> {
    let descriptor = ConnectionDescriptor::process_pipe(
        ServerName::new(name)?,
        ["python3".to_owned(), format!("{name}.py")],
    );
    let record = CatalogRecord::new(OwnerId::new(owner)?, descriptor, &DefaultClock);
    repository.insert(&record).await?;
    Ok(record)
}

/// Catalog whose inserts fail; reads delegate to an in-memory catalog.
#[derive(Debug, Default)]
pub struct FailingInsertRepository {
    inner: InMemoryCatalogRepository,
}

#[async_trait]
impl CatalogRepository for FailingInsertRepository {
    async fn insert(&self, _record: &CatalogRecord) -> CatalogResult<()> {
        Err(CatalogError::persistence(io::Error::other(
            "connection to catalog database lost",
        )))
    }

    async fn delete(&self, id: CatalogServerId) -> CatalogResult<()> {
        self.inner.delete(id).await
    }

    async fn find_by_id(&self, id: CatalogServerId) -> CatalogResult<Option<CatalogRecord>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_name(&self, name: &ServerName) -> CatalogResult<Option<CatalogRecord>> {
        self.inner.find_by_name(name).await
    }

    async fn list_all(&self) -> CatalogResult<Vec<CatalogRecord>> {
        self.inner.list_all().await
    }
}

/// Ownership store that refuses every link.
#[derive(Debug, Default)]
pub struct RefusingOwnershipStore;

#[async_trait]
impl OwnershipStore for RefusingOwnershipStore {
    async fn link(&self, _owner: &OwnerId, _server: &ServerName) -> OwnershipResult<()> {
        Err(OwnershipError::storage(io::Error::other("ownership table is read-only")))
    }

    async fn servers_for(&self, _owner: &OwnerId) -> OwnershipResult<Vec<ServerName>> {
        Ok(Vec::new())
    }
}

/// Generator whose templates always fail to render.
#[derive(Debug, Default)]
pub struct BrokenGenerator;

impl SourceGenerator for BrokenGenerator {
    fn generate(&self, _request: &GenerationRequest<'_>) -> GeneratorResult<GeneratedSource> {
        Err(GeneratorError::template(io::Error::other(
            "template syntax error: unexpected end of block",
        )))
    }
}
