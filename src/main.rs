use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::header;
use puzzle_backend::config::Config;
use puzzle_backend::constants::LEARNER_ID_HEADER;
use puzzle_backend::logging::{init_tracing, LogConfig};
use puzzle_backend::rating::config::EngineConfig;
use puzzle_backend::rating::PuzzleEngine;
use puzzle_backend::routes::build_router;
use puzzle_backend::state::AppState;
use puzzle_backend::store::Store;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing(&LogConfig::from_env());
    tracing::info!("Starting puzzle-backend");

    let config = Config::from_env();

    let engine_config = EngineConfig::from_env(&config.rating);
    if let Err(e) = engine_config.validate() {
        panic!("FATAL: Invalid rating configuration: {e}");
    }

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    tracing::info!(
        puzzles = store.count_puzzles(),
        learners = store.count_learners(),
        "Store opened"
    );

    let engine = Arc::new(PuzzleEngine::new(engine_config, store.clone()));
    let state = AppState::new(store.clone(), engine);

    let app = build_router(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let learner_header = header::HeaderName::from_static(LEARNER_ID_HEADER);

    if config.cors_origin.trim() == "*" {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_credentials(false)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, learner_header])
            .allow_methods(Any);
    }

    match config.cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT, learner_header])
            .allow_methods(Any),
        Err(e) => {
            panic!(
                "FATAL: Invalid CORS_ORIGIN '{}': {}. \
                 Fix the CORS_ORIGIN environment variable.",
                config.cors_origin, e
            );
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
}
