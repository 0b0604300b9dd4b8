pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod glicko;
pub mod selector;
pub mod types;
pub mod updater;

pub use engine::PuzzleEngine;
pub use error::EngineError;
