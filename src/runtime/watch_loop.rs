//! # Watch Loop
//!
//! Controller watch loop that monitors CertificateRequest resources and triggers
//! reconciliation when changes are detected.

use crate::constants::{DEFAULT_WATCH_BACKOFF_MAX_MS, DEFAULT_WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::CertificateRequest;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves on the first SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Run the controller watch loop
///
/// Restarts the controller stream when it ends or fails, until SIGINT/SIGTERM
/// flips the server to not-ready.
pub async fn run_watch_loop(
    requests: Api<CertificateRequest>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = reconciler.config.clone();
    let backoff_ms = Arc::new(AtomicU64::new(DEFAULT_WATCH_BACKOFF_START_MS));

    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!(
            concurrency = config.max_concurrent_reconciliations,
            "Starting controller watch loop..."
        );

        let stream_backoff = backoff_ms.clone();
        let stream_config = config.clone();
        Controller::new(requests.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciliations))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .for_each(move |result| {
                let backoff = stream_backoff.clone();
                let config = stream_config.clone();
                async move {
                    match result {
                        Ok((object, action)) => {
                            backoff.store(DEFAULT_WATCH_BACKOFF_START_MS, Ordering::Relaxed);
                            debug!(
                                resource.name = object.name.as_str(),
                                resource.namespace = object.namespace.as_deref().unwrap_or_default(),
                                action = ?action,
                                "watch.event.reconciled"
                            );
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                DEFAULT_WATCH_BACKOFF_MAX_MS,
                                config.watch_restart_delay_duration(),
                            )
                            .await;
                        }
                    }
                }
            })
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
