//! In-memory integration tests for the connection manager.

use rstest::{fixture, rstest};
use serde_json::json;
use slipway::connection::adapters::{InMemoryToolServers, ToolServerBehaviour};
use slipway::connection::domain::{ConnectionDescriptor, ServerName, TransportKind};
use slipway::connection::services::{ConnectionManager, ConnectionServiceError};
use std::sync::Arc;

struct TestContext {
    servers: InMemoryToolServers,
    manager: ConnectionManager,
}

#[fixture]
fn context() -> TestContext {
    let servers = InMemoryToolServers::new(ToolServerBehaviour::with_tools(["echo"]));
    let manager = ConnectionManager::new(Arc::new(servers.clone()));
    TestContext { servers, manager }
}

fn name(value: &str) -> ServerName {
    ServerName::new(value).expect("valid test server name")
}

fn pipe(value: &str) -> ConnectionDescriptor {
    ConnectionDescriptor::process_pipe(
        name(value),
        ["python3".to_owned(), format!("{value}.py")],
    )
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn handshake_advertises_client_capabilities(context: TestContext) {
    context
        .manager
        .connect(&pipe("weather"))
        .await
        .expect("connect should succeed");

    let handshakes = context.servers.handshakes();
    let params = handshakes.first().expect("one handshake");
    let capabilities = params.get("capabilities").expect("capabilities sent");
    for capability in ["tools", "resources", "prompts"] {
        assert!(capabilities.get(capability).is_some(), "{capability}");
    }
    assert_eq!(
        context.manager.transport_kind(&name("weather")).await,
        Some(TransportKind::ProcessPipe)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn http_stream_descriptor_connects(context: TestContext) {
    let descriptor = ConnectionDescriptor::http_stream(name("remote"), "http://127.0.0.1:8931/mcp");

    context
        .manager
        .connect(&descriptor)
        .await
        .expect("connect should succeed");

    assert_eq!(
        context.manager.transport_kind(&name("remote")).await,
        Some(TransportKind::HttpStream)
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_name_is_rejected_and_first_session_survives(context: TestContext) {
    context
        .manager
        .connect(&pipe("weather"))
        .await
        .expect("first connect should succeed");

    let result = context.manager.connect(&pipe("weather")).await;

    assert!(matches!(
        result,
        Err(ConnectionServiceError::AlreadyConnected(ref server)) if server.as_str() == "weather"
    ));
    let tools = context
        .manager
        .list_tools(&name("weather"))
        .await
        .expect("original session still answers");
    assert_eq!(tools.len(), 1);
    assert_eq!(context.servers.opened().len(), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_handshake_closes_transport_and_registers_nothing(context: TestContext) {
    context.servers.set_behaviour(
        name("broken"),
        ToolServerBehaviour::with_tools(["echo"]).failing_handshake("unsupported protocol"),
    );

    let result = context.manager.connect(&pipe("broken")).await;

    assert!(matches!(result, Err(ConnectionServiceError::Transport(_))));
    assert!(!context.manager.is_connected(&name("broken")).await);
    assert_eq!(context.servers.closed(), vec![name("broken")]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fan_out_skips_servers_whose_listing_fails(context: TestContext) {
    context.servers.set_behaviour(
        name("calendar"),
        ToolServerBehaviour::with_tools(["list_events", "create_event"]),
    );
    context.servers.set_behaviour(
        name("flaky"),
        ToolServerBehaviour::with_tools(["never_seen"]).failing_listing("internal error"),
    );
    for server in ["weather", "calendar", "flaky"] {
        context
            .manager
            .connect(&pipe(server))
            .await
            .expect("connect should succeed");
    }

    let tools = context.manager.list_all_tools().await;

    let mut names: Vec<(String, String)> = tools
        .iter()
        .map(|tool| (tool.server_name().to_string(), tool.name().to_owned()))
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            ("calendar".to_owned(), "create_event".to_owned()),
            ("calendar".to_owned(), "list_events".to_owned()),
            ("weather".to_owned(), "echo".to_owned()),
        ]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn paged_listings_are_followed_to_the_end(context: TestContext) {
    context.servers.set_behaviour(
        name("big"),
        ToolServerBehaviour::with_tools(["a", "b", "c", "d", "e"]).paged(2),
    );
    context
        .manager
        .connect(&pipe("big"))
        .await
        .expect("connect should succeed");

    let tools = context
        .manager
        .list_tools(&name("big"))
        .await
        .expect("listing should succeed");

    let names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn call_tool_routes_to_named_server(context: TestContext) {
    for server in ["weather", "calendar"] {
        context
            .manager
            .connect(&pipe(server))
            .await
            .expect("connect should succeed");
    }

    let result = context
        .manager
        .call_tool(&name("calendar"), "echo", json!({"text": "hi"}))
        .await
        .expect("call should succeed");

    assert_eq!(result.get("isError"), Some(&json!(false)));
    assert_eq!(
        context.servers.calls(),
        vec![(name("calendar"), "echo".to_owned(), json!({"text": "hi"}))]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn call_tool_on_unknown_server_names_it(context: TestContext) {
    let result = context
        .manager
        .call_tool(&name("missing"), "echo", json!({}))
        .await;

    let err = result.expect_err("unknown server must fail");
    assert!(matches!(err, ConnectionServiceError::NotConnected(_)));
    assert!(err.to_string().contains("'missing'"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn remote_errors_are_surfaced_unmodified(context: TestContext) {
    context
        .manager
        .connect(&pipe("weather"))
        .await
        .expect("connect should succeed");

    let err = context
        .manager
        .call_tool(&name("weather"), "no_such_tool", json!({}))
        .await
        .expect_err("unknown tool must fail");

    assert!(err.to_string().contains("Unknown tool: no_such_tool"));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disconnect_removes_session_and_tolerates_unknown_names(context: TestContext) {
    context
        .manager
        .connect(&pipe("weather"))
        .await
        .expect("connect should succeed");

    context
        .manager
        .disconnect(&name("weather"))
        .await
        .expect("disconnect should succeed");
    context
        .manager
        .disconnect(&name("weather"))
        .await
        .expect("second disconnect is a no-op");

    assert!(context.manager.list_connected_servers().await.is_empty());
    assert_eq!(context.manager.transport_kind(&name("weather")).await, None);
    assert_eq!(context.servers.closed(), vec![name("weather")]);
}
