//! In-memory integration tests for failures and compensating rollback.

use super::helpers::{
    BrokenGenerator, FailingInsertRepository, Harness, RefusingOwnershipStore, RunTranscript,
    harness, run_pipeline, weather_request,
};
use rstest::rstest;
use slipway::catalog::ports::CatalogRepository;
use slipway::connection::adapters::ToolServerBehaviour;
use slipway::connection::domain::ServerName;
use slipway::deployment::domain::{
    DeploymentFailure, DeploymentOutcome, DeploymentRequest, ErrorCategory, LanguageVariant, PackagingFormat,
    StepStatus,
};
use slipway::process::{CommandOutput, StartupReport, StartupSignal};
use std::io;
use std::sync::Arc;

fn failure_of(transcript: &RunTranscript) -> &DeploymentFailure {
    match &transcript.returned {
        DeploymentOutcome::Failure(failure) => failure,
        DeploymentOutcome::Success(success) => {
            panic!("deployment should fail, got success for {}", success.server_name)
        }
    }
}

/// Asserts the failed step ended in `error`, no later step started and the
/// terminal outcome was emitted once.
fn assert_stopped_at(transcript: &RunTranscript, step: u8) {
    let failure = failure_of(transcript);
    assert_eq!(failure.failed_step, Some(step));
    assert!(!failure.success);
    assert_eq!(
        transcript
            .events_for(step)
            .last()
            .map(|event| event.status),
        Some(StepStatus::Error)
    );
    assert!(transcript.steps.iter().all(|event| event.step <= step));
    assert_eq!(transcript.outcomes, vec![transcript.returned.clone()]);
}

async fn assert_nothing_left(harness: &Harness) {
    assert!(harness.connections.list_connected_servers().await.is_empty());
    assert!(
        harness
            .repository
            .list_all()
            .await
            .expect("catalog listing")
            .is_empty()
    );
    assert_eq!(harness.output_files().expect("list output"), Vec::<String>::new());
}

fn python_request() -> DeploymentRequest {
    weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_tool_fails_preflight_without_rollback(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness.runner.fail_spawn("node");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 1);
    let failure = failure_of(&transcript);
    assert!(failure.error.contains("`node`"));
    assert_eq!(failure.error_category, ErrorCategory::Dependency);
    assert_eq!(failure.fix_command.as_deref(), Some("sudo apt-get install -y nodejs npm"));
    assert_eq!(failure.rollback_report, None);
    assert_nothing_left(&harness).await;

    let probed: Vec<String> = harness
        .runner
        .invocations()
        .iter()
        .map(|invocation| invocation.program().to_owned())
        .collect();
    assert_eq!(probed, vec!["python3", "pip3", "node"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn descriptor_without_tools_fails_validation(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");
    let mut request = python_request();
    request.resource_descriptor.tools.clear();

    let transcript = run_pipeline(&orchestrator, request).await;

    assert_stopped_at(&transcript, 1);
    let failure = failure_of(&transcript);
    assert_eq!(failure.error_category, ErrorCategory::Validation);
    assert_eq!(failure.rollback_report, None);
    assert!(harness.runner.invocations().is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unregistered_companion_fails_preflight(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");
    let mut request = python_request();
    request.resource_descriptor.target_server = Some("search".to_owned());

    let transcript = run_pipeline(&orchestrator, request).await;

    assert_stopped_at(&transcript, 1);
    let failure = failure_of(&transcript);
    assert!(failure.error.contains("'search' is not registered"));
    assert_eq!(failure.error_category, ErrorCategory::Validation);
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn generation_failure_rolls_back_nothing(harness: io::Result<Harness>) {
    let mut harness = harness.expect("harness");
    harness.generator = Arc::new(BrokenGenerator);
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 2);
    let failure = failure_of(&transcript);
    assert_eq!(failure.rollback_report.as_deref(), Some("nothing to roll back"));
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn install_failure_removes_generated_file(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness.runner.respond(
        "pip3 install",
        CommandOutput::failed(
            1,
            "ERROR: Could not install packages due to an OSError: [Errno 13] Permission denied",
        ),
    );
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 3);
    let failure = failure_of(&transcript);
    assert_eq!(failure.error_category, ErrorCategory::Permission);
    let report = failure.rollback_report.as_deref().expect("rollback report");
    assert!(report.contains("rolled back"));
    let install_error = transcript
        .events_for(3)
        .last()
        .and_then(|event| event.logs.clone())
        .expect("install output attached to the error event");
    assert!(install_error.contains("Permission denied"));
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn startup_crash_is_classified_from_stderr(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness.prober.set_report(StartupReport::new(
        StartupSignal::Exited(Some(1)),
        "",
        "Traceback (most recent call last):\nModuleNotFoundError: No module named 'fastmcp'",
    ));
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 4);
    let failure = failure_of(&transcript);
    assert_eq!(failure.error, "server startup failed: Server exited with code 1");
    assert_eq!(failure.error_category, ErrorCategory::Dependency);
    assert_eq!(failure.fix_command.as_deref(), Some("pip3 install mcp fastmcp"));
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn startup_errors_at_timeout_fail_the_probe(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness.prober.set_report(StartupReport::new(
        StartupSignal::Timeout,
        "",
        "RuntimeError: event loop closed",
    ));
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 4);
    assert!(failure_of(&transcript).error.contains("Server startup errors detected"));
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn server_without_tools_fails_protocol_validation(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness
        .servers
        .set_fallback(ToolServerBehaviour::with_tools(Vec::<String>::new()));
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 5);
    let failure = failure_of(&transcript);
    assert_eq!(failure.error, "protocol validation failed: no tools found");
    assert_eq!(failure.error_category, ErrorCategory::Validation);
    let closed = harness.servers.closed();
    assert_eq!(closed.len(), 1);
    assert!(
        closed
            .iter()
            .all(|name| name.as_str().starts_with("weather_api_probe_"))
    );
    assert_nothing_left(&harness).await;
}

#[cfg(unix)]
#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rollback_kills_the_validation_server_process(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let mut server = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .expect("sleep should spawn");
    harness.servers.set_fallback(
        ToolServerBehaviour::with_tools(Vec::<String>::new()).backed_by_process(server.id()),
    );
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 5);
    let report = failure_of(&transcript)
        .rollback_report
        .as_deref()
        .expect("rollback report");
    assert!(report.contains("killed 1 process(es)"), "{report}");
    let status = server.wait().expect("server should be reaped");
    assert!(!status.success());
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn catalog_failure_rolls_back_file(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let repository = Arc::new(FailingInsertRepository::default());
    let orchestrator = harness
        .orchestrator_with(Arc::clone(&repository))
        .expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 6);
    assert!(failure_of(&transcript).error.contains("connection to catalog database lost"));
    assert!(repository.list_all().await.expect("catalog listing").is_empty());
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn activation_failure_deletes_catalog_record(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    harness.servers.set_behaviour(
        ServerName::new("weather_api").expect("valid name"),
        ToolServerBehaviour::with_tools(["get_forecast"])
            .refusing_connections("connection refused by weather_api"),
    );
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 7);
    let report = failure_of(&transcript)
        .rollback_report
        .as_deref()
        .expect("rollback report");
    assert!(report.contains("rolled back"));
    assert_nothing_left(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ownership_failure_disconnects_permanent_session(harness: io::Result<Harness>) {
    let mut harness = harness.expect("harness");
    harness.ownership = Arc::new(RefusingOwnershipStore);
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, python_request()).await;

    assert_stopped_at(&transcript, 7);
    let name = ServerName::new("weather_api").expect("valid name");
    assert!(harness.servers.closed().contains(&name));
    assert_nothing_left(&harness).await;
}
