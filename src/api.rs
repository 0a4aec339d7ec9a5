use anyhow::{Context, Result};
use axum::{extract::State, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::models::Statistics;
use crate::stats::StatisticsTracker;

pub async fn get_stats(State(stats): State<Arc<Mutex<StatisticsTracker>>>) -> Json<Statistics> {
    let stats = stats.lock().await;
    Json(stats.snapshot())
}

pub fn create_router(stats: Arc<Mutex<StatisticsTracker>>) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .with_state(stats)
}

pub async fn start_server(port: u16, stats: Arc<Mutex<StatisticsTracker>>) -> Result<()> {
    let app = create_router(stats);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind stats port {}", port))?;
    info!("Statistics: http://localhost:{}/api/stats", port);
    axum::serve(listener, app).await.context("Stats server failed")?;
    Ok(())
}
