use crate::infrastructure::shutdown::ShutdownSignal;
use crate::shared::error::MonitorError;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tracing::info;

/// Serve the healthcheck and Prometheus scrape endpoints until shutdown.
///
/// Binding or serving failures are returned so the caller can surface them
/// onto its failure channel.
pub async fn serve(
    listen_address: SocketAddr,
    handle: PrometheusHandle,
    shutdown: ShutdownSignal,
) -> Result<(), MonitorError> {
    let router = Router::new()
        .route("/", get(healthcheck))
        .route("/metrics", get(render_metrics))
        .with_state(handle);

    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .map_err(|e| MonitorError::Server(format!("failed to bind {}: {}", listen_address, e)))?;

    info!(listen_address = %listen_address, "Builder monitor server is going up...");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
        .map_err(|e| MonitorError::Server(format!("server failed: {}", e)))?;

    info!("Builder monitor server is down");
    Ok(())
}

async fn healthcheck() -> impl IntoResponse {
    StatusCode::OK
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
