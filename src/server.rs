use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio_util::sync::CancellationToken;

use crate::{Res, analytics::AnalyticsService, api};

pub fn router(service: Arc<AnalyticsService>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/analytics/overview", get(api::overview))
        .route("/analytics/genres", get(api::genres))
        .route("/analytics/moods", get(api::moods))
        .route("/analytics/playlists", get(api::playlists))
        .route("/analytics/tracks", get(api::tracks))
        .layer(Extension(service))
}

/// Serves the analytics routes until `shutdown` is cancelled.
///
/// Cancelling `shutdown` also cancels the analytics operations still in flight, they
/// answer with whatever they collected so far.
pub async fn start_api_server(
    service: Arc<AnalyticsService>,
    addr: &str,
    shutdown: CancellationToken,
) -> Res<()> {
    let addr = SocketAddr::from_str(addr)?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "analytics server listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl+C");
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
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received terminate signal, shutting down"),
    }
}
