//! Dependency initialization and wiring for the sync service.

use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use change_sync_repository::{IndexWriter, OpenSearchWriter};

use crate::config::SyncConfig;
use crate::consumer::{QueueTransport, SqsTransport};
use crate::manager::SyncManager;
use crate::metrics::MetricsCollector;
use crate::SyncError;

/// Default OpenSearch URL.
const DEFAULT_OPENSEARCH_URL: &str = "http://localhost:9200";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection at a fixed interval until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse connection mode from `OPENSEARCH_CONNECTION_MODE`.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if not set or invalid.
    pub fn from_env() -> Self {
        Self::parse(env::var("OPENSEARCH_CONNECTION_MODE").ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = %other, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured manager, not yet started.
    pub manager: Arc<SyncManager>,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_CONNECTION_MODE`: Connection mode - "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - Queue and pipeline settings, see [`SyncConfig::from_env`]
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(SyncError)` - If initialization fails (only in fail-fast mode)
    pub async fn new() -> Result<Self, SyncError> {
        let opensearch_url =
            env::var("OPENSEARCH_URL").unwrap_or_else(|_| DEFAULT_OPENSEARCH_URL.to_string());
        let connection_mode = ConnectionMode::from_env();
        let retry_interval = env::var("OPENSEARCH_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_INTERVAL_SECS);
        let config = SyncConfig::from_env();

        info!(
            opensearch_url = %opensearch_url,
            queue_url = ?config.queue.as_ref().map(|q| &q.queue_url),
            connection_mode = ?connection_mode,
            retry_interval_secs = retry_interval,
            "Initializing dependencies"
        );

        let writer = Self::connect_to_opensearch(
            &opensearch_url,
            connection_mode,
            Duration::from_secs(retry_interval),
        )
        .await?;

        info!("OpenSearch connection established");

        let transport: Option<Arc<dyn QueueTransport>> = match &config.queue {
            Some(settings) => Some(Arc::new(SqsTransport::from_settings(settings).await)),
            None => None,
        };

        let manager = Arc::new(SyncManager::new(
            config,
            Arc::new(writer) as Arc<dyn IndexWriter>,
            transport,
            Arc::new(MetricsCollector::new()),
        ));

        Ok(Self { manager })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        url: &str,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchWriter, SyncError> {
        loop {
            match Self::try_connect_opensearch(url).await {
                Ok(writer) => return Ok(writer),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(SyncError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }

    /// Attempt to connect to OpenSearch and ping the cluster.
    async fn try_connect_opensearch(url: &str) -> Result<OpenSearchWriter, SyncError> {
        let writer = OpenSearchWriter::new(url).await?;
        writer.check_connection().await?;
        Ok(writer)
    }
}
