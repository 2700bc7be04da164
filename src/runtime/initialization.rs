//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, probe
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::events::KubeEventPublisher;
use crate::controller::reconciler::{CertificateRequestStore, KubeStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::CertificateRequest;
use crate::provider::aws::PcaProvisionerFactory;
use crate::provider::ProvisionerCache;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// CertificateRequests across all namespaces
    pub requests: Api<CertificateRequest>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `LOG_LEVEL` applies to this crate.
pub fn init_tracing(config: &ControllerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "aws_privateca_issuer={}",
            config.log_level.to_lowercase()
        ))
    });

    let result = if config.json_logs() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - HTTP probe server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS client is built
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    init_tracing(&controller_config);

    info!("Starting AWS Private CA Issuer");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = server_config.probe_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_listening(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let requests: Api<CertificateRequest> = Api::all(client.clone());

    let store = Arc::new(KubeStore::new(
        client.clone(),
        controller_config.controller_name.clone(),
    ));
    let factory = Arc::new(PcaProvisionerFactory::new(
        client.clone(),
        controller_config.controller_namespace.clone(),
    ));
    let events = Arc::new(KubeEventPublisher::new(
        client.clone(),
        &controller_config.controller_name,
    ));

    info!(
        controller_namespace = %controller_config.controller_namespace,
        controller_name = %controller_config.controller_name,
        "Controller initialized, starting watch loop..."
    );

    let requests_store: Arc<dyn CertificateRequestStore> = Arc::<KubeStore>::clone(&store);
    let reconciler = Arc::new(Reconciler::new(
        requests_store,
        store,
        Arc::new(ProvisionerCache::new(factory)),
        events,
        controller_config,
    ));
    server_state.set_ready(true);

    Ok(InitializationResult {
        client,
        requests,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to bind its port
async fn wait_for_server_listening(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.listening() {
            info!("HTTP server is accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to start listening within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
