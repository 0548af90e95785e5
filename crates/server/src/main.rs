use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use clap::Parser;
use rand::Rng;
use specex_core::detector;
use specex_core::wire::{DetectRequest, DetectResponse};
use tracing::{info, warn};

#[derive(Debug, Clone, Parser)]
#[command(name = "specex-server", version, about = "Mock detection service for specex")]
struct Cli {
    /// Listen address.
    #[arg(long, env = "SPECEX_SERVER_LISTEN", default_value = "127.0.0.1:12345")]
    listen: SocketAddr,

    /// Base artificial latency added to every request, in milliseconds.
    #[arg(long = "latency-ms", env = "SPECEX_SERVER_LATENCY_MS", default_value_t = 0)]
    latency_ms: u64,

    /// Upper bound of uniform random jitter added on top, in milliseconds.
    #[arg(long = "jitter-ms", env = "SPECEX_SERVER_JITTER_MS", default_value_t = 0)]
    jitter_ms: u64,

    /// Log at info level instead of warn.
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Clone)]
struct AppState {
    latency: Duration,
    jitter_ms: u64,
}

async fn detect(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, (StatusCode, String)> {
    let recv_time_ms = Utc::now().timestamp_millis();

    let mut delay = state.latency;
    if state.jitter_ms > 0 {
        let jitter = rand::thread_rng().gen_range(0..=state.jitter_ms);
        delay += Duration::from_millis(jitter);
    }
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let image = request.image_bytes().map_err(|err| {
        warn!(req_id = request.req_id, "bad image payload: {err}");
        (StatusCode::BAD_REQUEST, format!("bad image_b64: {err}"))
    })?;

    info!(req_id = request.req_id, size = image.len(), "detect request");

    let started = tokio::time::Instant::now();
    let objects = tokio::task::spawn_blocking(move || detector::detect(&image))
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("detector task join error: {err}"),
            )
        })?;

    info!(
        req_id = request.req_id,
        objects = objects.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "detect complete"
    );

    Ok(Json(DetectResponse {
        req_id: request.req_id,
        recv_time_ms,
        objects,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.verbose { "info" } else { "warn" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = AppState {
        latency: Duration::from_millis(cli.latency_ms),
        jitter_ms: cli.jitter_ms,
    };

    let app = Router::new()
        .route("/api/detect", post(detect))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("listening on {}", cli.listen);
    axum::serve(listener, app).await?;
    Ok(())
}
