mod business_logic;
mod errors;
mod handlers;
mod models;
mod services;
mod state;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::business_logic::config::{MonitorConfig, SourceConfig, WaveConfig};
use crate::services::monitor::MonitorService;
use crate::services::series_source::SeriesSource;
use crate::services::wave_state::new_shared_state;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::waves::get_wave_status,
        handlers::waves::get_wave_stream,
        handlers::waves::post_detect
    ),
    components(schemas(
        models::health::HealthResponse,
        models::status::WaveStatus,
        models::status::DetectRequest,
        models::status::SamplePoint,
        models::wave::DetectionReport,
        models::wave::WavePeak,
        models::wave::ExtremumPoint,
        models::wave::InProgressWave,
        models::wave::FalseBreakoutSignal,
        models::wave::DetectionPhase,
        models::sample::DataQualityIssue,
        errors::ErrorResponse
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let monitor_config = MonitorConfig::from_env()?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_tracing(&monitor_config);

    let wave_config = WaveConfig::from_env()?;
    tracing::info!(
        "Wave detection: min amplitude {}, window {} samples, abandon tolerance {}",
        wave_config.min_amplitude,
        wave_config.window_minutes,
        wave_config.abandon_tolerance
    );
    match &monitor_config.source {
        SourceConfig::Directory(dir) => tracing::info!("Reading series from {}", dir.display()),
        SourceConfig::Http(url) => tracing::info!("Fetching series from {}", url),
    }

    let wave_state = new_shared_state();

    // Start wave monitoring in background
    let source = SeriesSource::new(&monitor_config.source);
    let mut monitor = MonitorService::new(
        source,
        wave_config.clone(),
        &monitor_config,
        wave_state.clone(),
    );
    let poll_secs = monitor_config.poll_interval_secs;

    tokio::spawn(async move {
        tracing::info!("Starting wave detection warmup...");
        if let Err(e) = monitor.warmup().await {
            tracing::error!("Warmup failed: {:#}", e);
        }

        tracing::info!("Wave detection active, polling every {}s", poll_secs);
        monitor.run().await;
    });

    let app_state = AppState {
        wave_state,
        wave_config,
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/waves", get(handlers::waves::get_wave_status))
        .route("/waves/stream", get(handlers::waves::get_wave_stream))
        .route("/waves/detect", post(handlers::waves::post_detect))
        .with_state(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&monitor_config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", monitor_config.bind_addr))?;
    tracing::info!("Server running on http://{}", monitor_config.bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", monitor_config.bind_addr);
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing(config: &MonitorConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "wavescreener=info,tower_http=debug".into());

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wavescreener.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            None
        }
    }
}
