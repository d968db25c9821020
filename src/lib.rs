pub mod api;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod normalize;
pub mod service;

pub use config::AppConfig;
pub use error::{ReconError, Result};
pub use service::{ExtractionCache, ExtractionService, Matcher};
