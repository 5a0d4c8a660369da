//! Server state and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use prd_agents::{ArtifactStore, ChatBackend, Crew, LlmAdapter, LlmClient, Pipeline};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;

/// State shared by every request handler.
pub struct SharedState {
    /// `None` when no provider key is configured.
    pub crew: Option<Arc<Crew>>,
    pub store: ArtifactStore,
}

pub struct Server {
    config: ServerConfig,
    backend: Option<Arc<dyn ChatBackend>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            backend: None,
        }
    }

    /// Create a server with a custom chat backend (for testing).
    pub fn with_backend(config: ServerConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            config,
            backend: Some(backend),
        }
    }

    /// Open the output directory, load the pipeline and build the crew.
    pub async fn build_state(&self) -> Result<Arc<SharedState>> {
        let store = ArtifactStore::open(&self.config.output_dir)
            .await
            .with_context(|| format!("Failed to open output dir {}", self.config.output_dir.display()))?;

        let pipeline = match &self.config.pipeline_config {
            Some(path) => {
                tracing::info!("Loading pipeline from {}", path.display());
                Pipeline::load(path).with_context(|| format!("Invalid pipeline config {}", path.display()))?
            }
            None => Pipeline::builtin().context("Built-in pipeline is invalid")?,
        };

        let backend: Option<Arc<dyn ChatBackend>> = match (&self.backend, self.config.api_key()) {
            (Some(backend), _) => Some(Arc::clone(backend)),
            (None, Some(key)) => {
                let client = LlmClient::new(key.to_string(), &self.config.base_url)
                    .with_timeout(self.config.request_timeout())?;
                Some(Arc::new(client))
            }
            (None, None) => {
                tracing::warn!("No provider API key set (OPENAI_API_KEY); generation is disabled");
                None
            }
        };

        let crew = backend.map(|backend| {
            let llm = LlmAdapter::new(backend, self.config.model.clone())
                .with_defaults(self.config.call_options())
                .with_reasoning_effort(Some(self.config.reasoning_effort));
            tracing::info!(
                model = %self.config.model,
                steps = pipeline.steps().len(),
                policy = %self.config.step_failure,
                "Crew ready"
            );
            Arc::new(Crew::new(pipeline, llm, store.clone()).with_failure_policy(self.config.step_failure))
        });

        Ok(Arc::new(SharedState { crew, store }))
    }

    /// Bind and serve until the process exits.
    pub async fn run(self) -> Result<()> {
        let state = self.build_state().await?;
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        tracing::info!("HTTP listener on {}", listener.local_addr()?);
        axum::serve(listener, crate::web::router(state)).await?;
        Ok(())
    }

    /// Start the server and return the bound address + task handle (for testing).
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let state = self.build_state().await?;
        let listener = TcpListener::bind(self.config.listen_addr()).await?;
        let addr = listener.local_addr()?;
        tracing::info!("Listening on {addr}");

        let router = crate::web::router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await?;
            Ok(())
        });

        Ok((addr, handle))
    }
}
