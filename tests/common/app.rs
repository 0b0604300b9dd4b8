use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;

use puzzle_backend::config::{Config, RatingEnvConfig};
use puzzle_backend::rating::config::EngineConfig;
use puzzle_backend::rating::PuzzleEngine;
use puzzle_backend::routes::build_router;
use puzzle_backend::state::AppState;
use puzzle_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

pub fn test_config(sled_path: String) -> Config {
    // Built directly so parallel tests never race on process env vars.
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        rating: RatingEnvConfig::default(),
    }
}

pub async fn spawn_test_server() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("puzzle-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string());

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    let engine = Arc::new(PuzzleEngine::new(
        EngineConfig::from_env(&config.rating),
        store.clone(),
    ));
    let state = AppState::new(store, engine);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

/// Engine over a fresh temp store, for tests that bypass HTTP.
pub fn temp_engine() -> (TempDir, Arc<Store>, PuzzleEngine) {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let path = temp_dir.path().join("engine-test.sled");
    let store = Arc::new(Store::open(path.to_str().expect("utf8 path")).expect("open store"));
    let engine = PuzzleEngine::new(EngineConfig::default(), store.clone());
    (temp_dir, store, engine)
}
