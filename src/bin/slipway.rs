//! Deploys one MCP tool-server from a JSON request and streams progress.
//!
//! Usage:
//!
//! ```text
//! slipway --request request.json [--config slipway.toml] [--database-url URL]
//! ```
//!
//! Progress events and the terminal outcome are written to stdout as
//! newline-delimited JSON; logs go to stderr. A representative request is:
//!
//! ```json
//! {
//!   "resourceDescriptor": {
//!     "name": "Weather API",
//!     "tools": [
//!       {
//!         "name": "get_forecast",
//!         "description": "Forecast for a city",
//!         "parameters": [{"name": "city", "type": "string", "required": true}]
//!       }
//!     ]
//!   },
//!   "format": "fastmcp",
//!   "languageVariant": "python",
//!   "owner": "alice"
//! }
//! ```
//!
//! Without `--database-url` the catalog lives in memory for the run.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use clap::Parser;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager as PgConnectionManager, Pool};
use mockable::DefaultClock;
use slipway::catalog::adapters::memory::{InMemoryCatalogRepository, InMemoryOwnershipStore};
use slipway::catalog::adapters::postgres::PostgresCatalogRepository;
use slipway::catalog::ports::{CatalogError, CatalogRepository};
use slipway::config::{ConfigError, DeploymentConfig};
use slipway::connection::adapters::DefaultTransportFactory;
use slipway::connection::services::ConnectionManager;
use slipway::deployment::adapters::TemplateSourceGenerator;
use slipway::deployment::domain::{DeploymentOutcome, DeploymentRequest};
use slipway::deployment::services::{DeploymentDependencies, DeploymentOrchestrator};
use slipway::process::{ProcessStartupProber, TokioCommandRunner};
use std::io::{self, Read, Write};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for failures before the pipeline could run.
const USAGE_FAILURE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "slipway", version, about = "Deploy a generated MCP tool-server")]
struct Cli {
    /// Deployment request JSON file, or `-` for stdin.
    #[arg(long, short)]
    request: Utf8PathBuf,

    /// Optional TOML configuration file.
    #[arg(long, short)]
    config: Option<Utf8PathBuf>,

    /// `PostgreSQL` URL for the catalog; in-memory when absent.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read request {path}: {source}")]
    ReadRequest { path: Utf8PathBuf, source: io::Error },

    #[error("invalid deployment request: {0}")]
    ParseRequest(#[from] serde_json::Error),

    #[error("failed to open database pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to write progress: {0}")]
    Output(#[source] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slipway=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!(error = %err, "slipway could not run the deployment");
            ExitCode::from(USAGE_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, CliError> {
    let mut config = match &cli.config {
        Some(path) => DeploymentConfig::load(path)?,
        None => DeploymentConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok())?;

    let raw_request = read_request(&cli.request)?;
    let request: DeploymentRequest = serde_json::from_str(&raw_request)?;

    if let Some(url) = cli.database_url.as_deref() {
        let pool = Pool::builder().build(PgConnectionManager::<PgConnection>::new(url))?;
        let repository = PostgresCatalogRepository::new(pool);
        repository.ensure_schema().await?;
        info!("using PostgreSQL catalog");
        deploy(Arc::new(repository), config, request).await
    } else {
        info!("using in-memory catalog");
        deploy(Arc::new(InMemoryCatalogRepository::new()), config, request).await
    }
}

async fn deploy<R>(
    repository: Arc<R>,
    config: DeploymentConfig,
    request: DeploymentRequest,
) -> Result<bool, CliError>
where
    R: CatalogRepository + 'static,
{
    let connections = Arc::new(ConnectionManager::new(Arc::new(
        DefaultTransportFactory::new(config.request_timeout()),
    )));
    let orchestrator = Arc::new(DeploymentOrchestrator::new(DeploymentDependencies {
        repository,
        connections: Arc::clone(&connections),
        ownership: Arc::new(InMemoryOwnershipStore::new()),
        generator: Arc::new(TemplateSourceGenerator::new(config.readiness_marker.as_str())),
        runner: Arc::new(TokioCommandRunner::new()),
        prober: Arc::new(ProcessStartupProber::new(config.readiness_marker.as_str())),
        clock: Arc::new(DefaultClock),
        config,
    }));

    let mut events = orchestrator.spawn(request);
    let mut succeeded = false;
    while let Some(message) = events.recv().await {
        if let Some(outcome) = message.as_outcome() {
            succeeded = matches!(outcome, DeploymentOutcome::Success(_));
        }
        let line = message.to_ndjson_line()?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(line.as_bytes()).map_err(CliError::Output)?;
        stdout.flush().map_err(CliError::Output)?;
    }

    for name in connections.list_connected_servers().await {
        if let Err(err) = connections.disconnect(&name).await {
            error!(server = %name, error = %err, "failed to close session on exit");
        }
    }
    Ok(succeeded)
}

fn read_request(path: &Utf8Path) -> Result<String, CliError> {
    let read_error = |source| CliError::ReadRequest {
        path: path.to_owned(),
        source,
    };
    if path.as_str() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).map_err(read_error)?;
        return Ok(buffer);
    }

    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| read_error(io::Error::from(io::ErrorKind::InvalidInput)))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
    dir.read_to_string(file_name).map_err(read_error)
}
