//! Transport factory backed by real processes and HTTP.

use super::{StdioTransport, StreamableHttpTransport};
use crate::connection::{
    domain::{ServerName, TransportEndpoint},
    ports::{Transport, TransportFactory, TransportResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Default per-request timeout applied by both transports.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens [`StdioTransport`] and [`StreamableHttpTransport`] instances.
#[derive(Debug, Clone)]
pub struct DefaultTransportFactory {
    request_timeout: Duration,
    client: reqwest::Client,
}

impl DefaultTransportFactory {
    /// Creates a factory applying `request_timeout` to every request.
    #[must_use]
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DefaultTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

#[async_trait]
impl TransportFactory for DefaultTransportFactory {
    async fn open(
        &self,
        server_name: &ServerName,
        endpoint: &TransportEndpoint,
    ) -> TransportResult<Arc<dyn Transport>> {
        match endpoint {
            TransportEndpoint::ProcessPipe(pipe) => Ok(Arc::new(StdioTransport::spawn(
                server_name.clone(),
                pipe,
                self.request_timeout,
            )?)),
            TransportEndpoint::HttpStream(http) => Ok(Arc::new(StreamableHttpTransport::new(
                server_name.clone(),
                self.client.clone(),
                http,
                self.request_timeout,
            ))),
        }
    }
}
