//! In-memory integration tests for successful deployments.

use super::helpers::{Harness, harness, run_pipeline, seed_record, weather_request};
use rstest::rstest;
use slipway::catalog::domain::OwnerId;
use slipway::catalog::ports::{CatalogRepository, OwnershipStore};
use slipway::connection::adapters::ToolServerBehaviour;
use slipway::connection::domain::ServerName;
use slipway::deployment::domain::{
    DeploymentMessage, DeploymentOutcome, LanguageVariant, PackagingFormat, StepStatus,
    TOTAL_STEPS,
};
use std::io;
use std::sync::Arc;

#[rstest]
#[case(PackagingFormat::Fastmcp, LanguageVariant::Python, "py", "fastmcp")]
#[case(PackagingFormat::Standalone, LanguageVariant::Python, "py", "mcp")]
#[case(PackagingFormat::Fastmcp, LanguageVariant::Node, "mjs", "fastmcp")]
#[case(PackagingFormat::Standalone, LanguageVariant::Node, "mjs", "@modelcontextprotocol/sdk")]
#[tokio::test(flavor = "multi_thread")]
async fn deployment_registers_connects_and_links_owner(
    harness: io::Result<Harness>,
    #[case] format: PackagingFormat,
    #[case] language: LanguageVariant,
    #[case] extension: &str,
    #[case] installed_package: &str,
) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(&orchestrator, weather_request(format, language)).await;

    let DeploymentOutcome::Success(success) = &transcript.returned else {
        panic!("deployment should succeed: {:?}", transcript.returned);
    };
    assert_eq!(success.server_name, "weather_api");
    assert!(success.file_path.ends_with(&format!(".{extension}")));
    assert_eq!(success.message, "MCP server 'weather_api' deployed and connected");

    let name = ServerName::new("weather_api").expect("valid name");
    assert_eq!(harness.connections.list_connected_servers().await, vec![name.clone()]);
    let record = harness
        .repository
        .find_by_name(&name)
        .await
        .expect("catalog lookup")
        .expect("record stored");
    assert!(record.enabled());
    assert_eq!(record.owner().as_str(), "alice");

    let owned = harness
        .ownership
        .servers_for(&OwnerId::new("alice").expect("valid owner"))
        .await
        .expect("ownership lookup");
    assert_eq!(owned, vec![name]);

    let files = harness.output_files().expect("list output");
    assert_eq!(files.len(), 1);
    let contents =
        std::fs::read_to_string(&success.file_path).expect("generated source is readable");
    assert!(contents.contains("get_forecast"));

    let installs: Vec<_> = harness
        .runner
        .invocations()
        .into_iter()
        .filter(|invocation| invocation.args().first().is_some_and(|arg| arg == "install"))
        .collect();
    assert_eq!(installs.len(), 1);
    assert!(
        installs
            .iter()
            .flat_map(|invocation| invocation.args())
            .any(|arg| arg == installed_package)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn every_step_reports_pending_running_success_in_order(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(
        &orchestrator,
        weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python),
    )
    .await;

    assert!(transcript.returned.is_success());
    assert!(
        transcript
            .steps
            .windows(2)
            .all(|pair| pair.first().map(|event| event.step) <= pair.last().map(|event| event.step))
    );
    assert!(transcript.steps.iter().all(|event| event.total == TOTAL_STEPS));
    for step in 1..=TOTAL_STEPS {
        let statuses: Vec<StepStatus> = transcript
            .events_for(step)
            .iter()
            .map(|event| event.status)
            .collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Pending, StepStatus::Running, StepStatus::Success],
            "step {step}"
        );
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exactly_one_terminal_outcome_is_emitted(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(
        &orchestrator,
        weather_request(PackagingFormat::Standalone, LanguageVariant::Python),
    )
    .await;

    assert_eq!(transcript.outcomes, vec![transcript.returned.clone()]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn spawned_pipeline_ends_stream_with_outcome(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = Arc::new(harness.orchestrator().expect("orchestrator"));

    let mut receiver =
        orchestrator.spawn(weather_request(PackagingFormat::Fastmcp, LanguageVariant::Node));
    let mut messages = Vec::new();
    while let Some(message) = receiver.recv().await {
        messages.push(message);
    }

    let finished = messages
        .iter()
        .filter(|message| matches!(message, DeploymentMessage::Finished(_)))
        .count();
    assert_eq!(finished, 1);
    assert!(matches!(
        messages.last(),
        Some(DeploymentMessage::Finished(DeploymentOutcome::Success(_)))
    ));
    let line = messages
        .last()
        .expect("terminal message")
        .to_ndjson_line()
        .expect("serializable");
    assert!(line.ends_with('\n'));
    assert!(line.contains("\"serverName\":\"weather_api\""));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn name_collision_registers_suffixed_name(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let existing = seed_record(&harness.repository, "bob", "weather_api")
        .await
        .expect("seeded record");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(
        &orchestrator,
        weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python),
    )
    .await;

    let DeploymentOutcome::Success(success) = &transcript.returned else {
        panic!("deployment should succeed: {:?}", transcript.returned);
    };
    assert!(success.server_name.starts_with("weather_api_"));
    assert_ne!(success.server_name, existing.name().as_str());

    let records = harness.repository.list_all().await.expect("catalog listing");
    assert_eq!(records.len(), 2);
    let untouched = harness
        .repository
        .find_by_id(existing.id())
        .await
        .expect("catalog lookup")
        .expect("existing record kept");
    assert_eq!(untouched.owner().as_str(), "bob");

    let stored = ServerName::new(success.server_name.as_str()).expect("valid name");
    assert!(harness.connections.is_connected(&stored).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn throwaway_session_is_closed_before_registration(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(
        &orchestrator,
        weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python),
    )
    .await;

    assert!(transcript.returned.is_success());
    let opened = harness.servers.opened();
    assert_eq!(opened.len(), 2);
    let probe = opened.first().expect("probe session opened first");
    assert!(probe.as_str().starts_with("weather_api_probe_"));
    assert_eq!(harness.servers.closed(), vec![probe.clone()]);
    assert!(!harness.connections.is_connected(probe).await);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn companion_server_that_is_connected_passes_preflight(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let companion = seed_record(&harness.repository, "alice", "search")
        .await
        .expect("seeded companion");
    harness
        .connections
        .connect(companion.transport())
        .await
        .expect("companion connects");
    let orchestrator = harness.orchestrator().expect("orchestrator");
    let mut request = weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python);
    request.resource_descriptor.target_server = Some("search".to_owned());

    let transcript = run_pipeline(&orchestrator, request).await;

    assert!(transcript.returned.is_success(), "{:?}", transcript.returned);
    assert_eq!(harness.connections.list_connected_servers().await.len(), 2);
}

#[cfg(unix)]
#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn validation_process_is_released_once_the_session_closes(harness: io::Result<Harness>) {
    let harness = harness.expect("harness");
    let mut server = std::process::Command::new("sleep")
        .arg("30")
        .spawn()
        .expect("sleep should spawn");
    harness.servers.set_fallback(
        ToolServerBehaviour::with_tools(["get_forecast"]).backed_by_process(server.id()),
    );
    let orchestrator = harness.orchestrator().expect("orchestrator");

    let transcript = run_pipeline(
        &orchestrator,
        weather_request(PackagingFormat::Fastmcp, LanguageVariant::Python),
    )
    .await;

    assert!(transcript.returned.is_success());
    let still_running = server.try_wait().expect("status check").is_none();
    server.kill().expect("sleep should be killable");
    server.wait().expect("sleep should be reaped");
    assert!(still_running, "a released process must not be killed");
}
