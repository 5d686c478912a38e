//! Seven-step deployment pipeline with compensating rollback.

use super::companion::validate_companion;
use super::{DeploymentError, DeploymentResult, EnvironmentValidator, RollbackCoordinator, RollbackReport};
use crate::catalog::domain::{CatalogRecord, OwnerId};
use crate::catalog::ports::{CatalogRepository, OwnershipStore};
use crate::catalog::services::CatalogService;
use crate::config::DeploymentConfig;
use crate::connection::domain::{ConnectionDescriptor, ServerName};
use crate::connection::services::{ConnectionManager, ConnectionServiceError};
use crate::deployment::adapters::SourceWorkspace;
use crate::deployment::domain::{
    DeploymentFailure, DeploymentMessage, DeploymentOutcome, DeploymentRequest, DeploymentState,
    DeploymentStep, DeploymentSuccess, PipelineStep, StepStatus, classify_error,
};
use crate::deployment::ports::{GenerationRequest, SourceGenerator};
use crate::process::{CommandInvocation, CommandRunner, StartupProbe, StartupSignal};
use camino::{Utf8Path, Utf8PathBuf};
use mockable::Clock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hex characters of a UUID used in throwaway session names.
const PROBE_SUFFIX_LEN: usize = 8;

/// Collaborators of a [`DeploymentOrchestrator`].
pub struct DeploymentDependencies<R, C> {
    /// Catalog persistence.
    pub repository: Arc<R>,
    /// Shared session registry.
    pub connections: Arc<ConnectionManager>,
    /// Per-user ownership links.
    pub ownership: Arc<dyn OwnershipStore>,
    /// Server source generator.
    pub generator: Arc<dyn SourceGenerator>,
    /// Runner for version probes and installs.
    pub runner: Arc<dyn CommandRunner>,
    /// Startup prober.
    pub prober: Arc<dyn StartupProbe>,
    /// Clock for catalog timestamps.
    pub clock: Arc<C>,
    /// Pipeline settings.
    pub config: DeploymentConfig,
}

/// Values settled by the environment step.
struct Preflight {
    owner: OwnerId,
    server_name: ServerName,
}

/// A failed step and why it failed.
struct StepFailure {
    step: PipelineStep,
    error: DeploymentError,
}

/// Emits events in order; a dropped receiver only silences the stream.
struct Progress<'a> {
    sink: &'a mpsc::UnboundedSender<DeploymentMessage>,
}

impl Progress<'_> {
    fn emit(&self, message: DeploymentMessage) {
        if self.sink.send(message).is_err() {
            debug!("deployment event receiver dropped");
        }
    }

    fn begin(&self, step: PipelineStep) {
        self.emit(DeploymentMessage::Step(DeploymentStep::new(step, StepStatus::Pending)));
        self.emit(DeploymentMessage::Step(DeploymentStep::new(step, StepStatus::Running)));
    }

    fn succeed(&self, step: PipelineStep, message: impl Into<String>, logs: Option<&str>) {
        let mut event = DeploymentStep::with_message(step, StepStatus::Success, message);
        if let Some(captured) = logs {
            event = event.with_logs(captured);
        }
        self.emit(DeploymentMessage::Step(event));
    }

    fn fail(&self, step: PipelineStep, error: DeploymentError) -> StepFailure {
        let mut event = DeploymentStep::with_message(step, StepStatus::Error, error.to_string());
        if let Some(captured) = error.logs() {
            event = event.with_logs(captured);
        }
        self.emit(DeploymentMessage::Step(event));
        StepFailure { step, error }
    }
}

/// Drives deployments from request to connected, registered server.
///
/// Steps run strictly in sequence. A failure in steps 2 to 7 triggers the
/// [`RollbackCoordinator`]; every path ends with exactly one terminal
/// [`DeploymentOutcome`] and a kill of any process still tracked.
pub struct DeploymentOrchestrator<R, C>
where
    R: CatalogRepository,
    C: Clock + Send + Sync,
{
    repository: Arc<R>,
    catalog: CatalogService<R, C>,
    connections: Arc<ConnectionManager>,
    ownership: Arc<dyn OwnershipStore>,
    generator: Arc<dyn SourceGenerator>,
    runner: Arc<dyn CommandRunner>,
    prober: Arc<dyn StartupProbe>,
    environment: EnvironmentValidator,
    workspace: SourceWorkspace,
    config: DeploymentConfig,
}

impl<R, C> DeploymentOrchestrator<R, C>
where
    R: CatalogRepository + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(dependencies: DeploymentDependencies<R, C>) -> Self {
        let DeploymentDependencies {
            repository,
            connections,
            ownership,
            generator,
            runner,
            prober,
            clock,
            config,
        } = dependencies;
        let environment = EnvironmentValidator::new(
            Arc::clone(&runner),
            config.required_tools.clone(),
            config.probe_timeout(),
        );
        Self {
            catalog: CatalogService::new(Arc::clone(&repository), clock),
            repository,
            connections,
            ownership,
            generator,
            runner,
            prober,
            environment,
            workspace: SourceWorkspace::new(config.output_dir.clone()),
            config,
        }
    }

    /// Runs the pipeline on a background task.
    ///
    /// The receiver yields step events followed by exactly one
    /// [`DeploymentMessage::Finished`], then closes.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, request: DeploymentRequest) -> mpsc::UnboundedReceiver<DeploymentMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = orchestrator.run(request, &sender).await;
            debug!(success = outcome.is_success(), "deployment task finished");
        });
        receiver
    }

    /// Runs the pipeline, emitting events to `sink`, and returns the
    /// outcome that was emitted last.
    #[must_use]
    pub async fn run(
        &self,
        request: DeploymentRequest,
        sink: &mpsc::UnboundedSender<DeploymentMessage>,
    ) -> DeploymentOutcome {
        let progress = Progress { sink };
        info!(
            resource = %request.resource_descriptor.name,
            format = %request.format,
            language = %request.language_variant,
            "deployment started"
        );

        let outcome = match self.preflight(&request, &progress).await {
            Err(failure) => Self::failure(&failure, None),
            Ok(preflight) => {
                let mut state = DeploymentState::new(preflight.owner.clone());
                let result = self
                    .execute(&request, &preflight, &mut state, &progress)
                    .await;
                let finished = match result {
                    Ok(success) => DeploymentOutcome::Success(success),
                    Err(failure) => {
                        let report = RollbackCoordinator::new(
                            &self.connections,
                            &*self.repository,
                            &self.workspace,
                        )
                        .rollback(&mut state)
                        .await;
                        Self::failure(&failure, Some(&report))
                    }
                };
                let leftovers = state.processes().kill_all();
                if !leftovers.is_clean() {
                    warn!(report = %leftovers, "processes survived deployment cleanup");
                }
                finished
            }
        };

        match &outcome {
            DeploymentOutcome::Success(success) => {
                info!(server = %success.server_name, path = %success.file_path, "deployment succeeded");
            }
            DeploymentOutcome::Failure(failure) => {
                warn!(
                    error = %failure.error,
                    category = %failure.error_category,
                    step = ?failure.failed_step,
                    "deployment failed"
                );
            }
        }
        progress.emit(DeploymentMessage::Finished(outcome.clone()));
        outcome
    }

    fn failure(failure: &StepFailure, report: Option<&RollbackReport>) -> DeploymentOutcome {
        let text = failure.error.to_string();
        // Captured output often names the real cause, e.g. a missing module.
        let classified = failure.error.logs().map_or_else(
            || classify_error(&text),
            |logs| classify_error(&format!("{text}\n{logs}")),
        );
        DeploymentOutcome::Failure(DeploymentFailure {
            success: false,
            error: text,
            error_category: classified.category,
            troubleshooting: classified.troubleshooting,
            fix_command: classified.fix_command,
            rollback_report: report.map(ToString::to_string),
            failed_step: Some(failure.step.number()),
        })
    }

    async fn preflight(
        &self,
        request: &DeploymentRequest,
        progress: &Progress<'_>,
    ) -> Result<Preflight, StepFailure> {
        let step = PipelineStep::Environment;
        progress.begin(step);
        match self.check_environment(request).await {
            Ok((preflight, versions)) => {
                progress.succeed(step, "Environment ready", Some(&versions.join("\n")));
                Ok(preflight)
            }
            Err(error) => Err(progress.fail(step, error)),
        }
    }

    async fn check_environment(
        &self,
        request: &DeploymentRequest,
    ) -> DeploymentResult<(Preflight, Vec<String>)> {
        let descriptor = &request.resource_descriptor;
        descriptor.validate()?;
        let server_name = descriptor.server_name()?;
        let owner = request.owner_id()?;

        let versions = self.environment.check_tools().await?;
        self.workspace.ensure_writable()?;
        if let Some(target) = descriptor.target_server.as_deref() {
            let companion =
                validate_companion(target, &*self.repository, &self.connections).await?;
            debug!(companion = %companion, "companion server available");
        }
        Ok((Preflight { owner, server_name }, versions))
    }

    async fn execute(
        &self,
        request: &DeploymentRequest,
        preflight: &Preflight,
        state: &mut DeploymentState,
        progress: &Progress<'_>,
    ) -> Result<DeploymentSuccess, StepFailure> {
        progress.begin(PipelineStep::Materialize);
        let file_path = self
            .materialize(request, &preflight.server_name, state)
            .map_err(|error| progress.fail(PipelineStep::Materialize, error))?;
        progress.succeed(PipelineStep::Materialize, format!("Wrote {file_path}"), None);

        progress.begin(PipelineStep::Install);
        let install_logs = self
            .install(request, state)
            .await
            .map_err(|error| progress.fail(PipelineStep::Install, error))?;
        progress.succeed(PipelineStep::Install, "Dependencies installed", Some(&install_logs));

        progress.begin(PipelineStep::StartupProbe);
        let signal = self
            .probe_startup(request, &file_path, state)
            .await
            .map_err(|error| progress.fail(PipelineStep::StartupProbe, error))?;
        let startup_message = match signal {
            StartupSignal::Marker => "Server reported ready",
            StartupSignal::Timeout => "Server kept running without errors",
            StartupSignal::Exited(_) => "Server exited cleanly",
        };
        progress.succeed(PipelineStep::StartupProbe, startup_message, None);

        progress.begin(PipelineStep::ProtocolValidation);
        let tools = self
            .validate_protocol(request, &preflight.server_name, &file_path, state)
            .await
            .map_err(|error| progress.fail(PipelineStep::ProtocolValidation, error))?;
        progress.succeed(
            PipelineStep::ProtocolValidation,
            format!("Server exposes {} tool(s)", tools.len()),
            Some(&tools.join("\n")),
        );

        progress.begin(PipelineStep::CatalogRegistration);
        let record = self
            .register(request, preflight, &file_path, state)
            .await
            .map_err(|error| progress.fail(PipelineStep::CatalogRegistration, error))?;
        progress.succeed(
            PipelineStep::CatalogRegistration,
            format!("Registered as '{}'", record.name()),
            None,
        );

        progress.begin(PipelineStep::Activation);
        self.activate(&record, state)
            .await
            .map_err(|error| progress.fail(PipelineStep::Activation, error))?;
        progress.succeed(
            PipelineStep::Activation,
            format!("Server '{}' connected", record.name()),
            None,
        );

        Ok(DeploymentSuccess::new(record.name().as_str(), file_path.as_str()))
    }

    fn materialize(
        &self,
        request: &DeploymentRequest,
        server_name: &ServerName,
        state: &mut DeploymentState,
    ) -> DeploymentResult<Utf8PathBuf> {
        let source = self.generator.generate(&GenerationRequest {
            descriptor: &request.resource_descriptor,
            server_name,
            format: request.format,
            language: request.language_variant,
        })?;
        let file_name = source.file_name(server_name, request.language_variant);
        let file = self.workspace.materialize(&file_name, source.contents())?;
        if file.created {
            state.mark_file_created(file.path.clone());
        }
        Ok(file.path)
    }

    async fn install(
        &self,
        request: &DeploymentRequest,
        state: &mut DeploymentState,
    ) -> DeploymentResult<String> {
        let command = self
            .config
            .install
            .for_variant(request.format, request.language_variant);
        let Some((program, args)) = command.split_first() else {
            state.mark_dependencies_installed();
            return Ok(String::new());
        };

        let invocation =
            CommandInvocation::new(program.as_str(), args.iter()).in_directory(self.workspace.root());
        let output = self
            .runner
            .run(&invocation, self.config.install_timeout(), state.processes())
            .await?;
        if !output.success {
            return Err(DeploymentError::Install {
                summary: output.summary(),
                output: output.output().to_owned(),
            });
        }
        state.mark_dependencies_installed();
        Ok(output.output().to_owned())
    }

    async fn probe_startup(
        &self,
        request: &DeploymentRequest,
        file_path: &Utf8Path,
        state: &DeploymentState,
    ) -> DeploymentResult<StartupSignal> {
        let invocation = CommandInvocation::new(
            self.config.interpreter(request.language_variant),
            [file_path.as_str()],
        );
        let report = self
            .prober
            .probe(&invocation, self.config.startup_timeout(), state.processes())
            .await?;
        report
            .verdict()
            .map_err(|reason| DeploymentError::Startup {
                reason,
                stderr: report.stderr_tail(),
            })?;
        Ok(report.signal)
    }

    async fn validate_protocol(
        &self,
        request: &DeploymentRequest,
        server_name: &ServerName,
        file_path: &Utf8Path,
        state: &mut DeploymentState,
    ) -> DeploymentResult<Vec<String>> {
        let token: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(PROBE_SUFFIX_LEN)
            .collect();
        let probe_name = server_name
            .with_suffix(&format!("probe_{token}"))
            .map_err(ConnectionServiceError::from)?;
        let descriptor = self.launch_descriptor(probe_name.clone(), request, file_path);

        self.connections.connect(&descriptor).await?;
        state.mark_test_server_connected(probe_name.clone());
        let pid = self.connections.process_id(&probe_name).await;
        if let Some(id) = pid {
            state
                .processes()
                .track(id, format!("protocol validation: {probe_name}"));
        }

        let tools = self.connections.list_tools(&probe_name).await?;
        if tools.is_empty() {
            return Err(DeploymentError::NoToolsFound);
        }

        self.connections.disconnect(&probe_name).await?;
        state.clear_test_server();
        if let Some(id) = pid {
            state.processes().release(id);
        }
        Ok(tools.iter().map(|tool| tool.name().to_owned()).collect())
    }

    async fn register(
        &self,
        request: &DeploymentRequest,
        preflight: &Preflight,
        file_path: &Utf8Path,
        state: &mut DeploymentState,
    ) -> DeploymentResult<CatalogRecord> {
        let descriptor =
            self.launch_descriptor(preflight.server_name.clone(), request, file_path);
        let record = self
            .catalog
            .register_unique(preflight.owner.clone(), &descriptor)
            .await?;
        state.mark_db_entry_created(record.id(), record.name().clone());
        Ok(record)
    }

    async fn activate(
        &self,
        record: &CatalogRecord,
        state: &mut DeploymentState,
    ) -> DeploymentResult<()> {
        self.connections.connect(record.transport()).await?;
        state.mark_server_connected();
        self.ownership.link(state.owner(), record.name()).await?;
        Ok(())
    }

    fn launch_descriptor(
        &self,
        name: ServerName,
        request: &DeploymentRequest,
        file_path: &Utf8Path,
    ) -> ConnectionDescriptor {
        ConnectionDescriptor::process_pipe(
            name,
            [
                self.config.interpreter(request.language_variant).to_owned(),
                file_path.to_string(),
            ],
        )
    }
}
