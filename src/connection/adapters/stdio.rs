//! Process-pipe transport: line-delimited JSON-RPC over a child's stdio.

use crate::connection::{
    domain::{
        JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ProcessPipeEndpoint, ServerName,
        TransportKind,
    },
    ports::{Transport, TransportError, TransportResult},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>;

/// JSON-RPC transport over a spawned child process.
///
/// Requests are written one per line to the child's stdin; responses read
/// from stdout are routed to the waiting caller by id. Stderr is drained to
/// the debug log. The child is killed on [`Transport::close`] and, as a
/// backstop, when the transport is dropped.
pub struct StdioTransport {
    server_name: ServerName,
    next_id: AtomicU64,
    pending: PendingMap,
    outbound: mpsc::UnboundedSender<String>,
    child: tokio::sync::Mutex<Option<Child>>,
    pid: Option<u32>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StdioTransport")
            .field("server_name", &self.server_name)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Spawns the endpoint's program and starts the pipe tasks.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Spawn`] naming the program when it cannot be
    /// started.
    pub fn spawn(
        server_name: ServerName,
        endpoint: &ProcessPipeEndpoint,
        request_timeout: Duration,
    ) -> TransportResult<Self> {
        let mut child = Command::new(&endpoint.program)
            .args(&endpoint.args)
            .envs(&endpoint.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| TransportError::spawn(endpoint.program.clone(), err))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Protocol("child stdin is not piped".to_owned()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Protocol("child stdout is not piped".to_owned()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Protocol("child stderr is not piped".to_owned()))?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let tasks = vec![
            tokio::spawn(write_requests(server_name.clone(), stdin, outbound_rx)),
            tokio::spawn(route_responses(
                server_name.clone(),
                stdout,
                Arc::clone(&pending),
            )),
            tokio::spawn(drain_stderr(server_name.clone(), stderr)),
        ];

        debug!(server = %server_name, program = %endpoint.program, "spawned process-pipe server");
        Ok(Self {
            server_name,
            next_id: AtomicU64::new(1),
            pending,
            outbound,
            child: tokio::sync::Mutex::new(Some(child)),
            pid,
            tasks: Mutex::new(tasks),
            request_timeout,
        })
    }

    fn forget(&self, id: u64) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn send_line(&self, line: String) -> TransportResult<()> {
        self.outbound
            .send(line)
            .map_err(|_| TransportError::Closed)
    }
}

#[async_trait]
impl Transport for StdioTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::ProcessPipe
    }

    fn process_id(&self) -> Option<u32> {
        self.pid
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))
            .map_err(TransportError::io)?;

        let (response_tx, response_rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, response_tx);

        if let Err(err) = self.send_line(line) {
            self.forget(id);
            return Err(err);
        }

        match tokio::time::timeout(self.request_timeout, response_rx).await {
            Ok(Ok(response)) => response.into_result().map_err(TransportError::Remote),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.forget(id);
                Err(TransportError::Timeout {
                    method: method.to_owned(),
                })
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> TransportResult<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method, params))
            .map_err(TransportError::io)?;
        self.send_line(line)
    }

    async fn close(&self) -> TransportResult<()> {
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        for task in tasks {
            task.abort();
        }
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };
        if child.try_wait().map_err(TransportError::io)?.is_none() {
            child.kill().await.map_err(TransportError::io)?;
        }
        debug!(server = %self.server_name, "process-pipe server stopped");
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

async fn write_requests(
    server_name: ServerName,
    mut stdin: tokio::process::ChildStdin,
    mut outbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = outbound.recv().await {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(server = %server_name, error = %err, "failed to write to MCP server stdin");
            break;
        }
    }
}

async fn route_responses(
    server_name: ServerName,
    stdout: tokio::process::ChildStdout,
    pending: PendingMap,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Ok(value) = serde_json::from_str::<Value>(&line) else {
                    debug!(server = %server_name, line = %line.trim(), "ignoring non-JSON stdout line");
                    continue;
                };
                let Some(response) = JsonRpcResponse::parse(value) else {
                    continue;
                };
                let Some(id) = response.request_id() else {
                    continue;
                };
                let waiter = pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                if let Some(waiter) = waiter
                    && waiter.send(response).is_err()
                {
                    debug!(server = %server_name, id, "caller stopped waiting for response");
                }
            }
            Ok(None) => {
                debug!(server = %server_name, "MCP server stdout closed");
                break;
            }
            Err(err) => {
                warn!(server = %server_name, error = %err, "failed to read MCP server stdout");
                break;
            }
        }
    }
    pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clear();
}

async fn drain_stderr(server_name: ServerName, stderr: tokio::process::ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(server = %server_name, "{}", line.trim_end());
    }
}
