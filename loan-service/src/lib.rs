pub mod assistant;
pub mod config;
pub mod error;
pub mod models;
pub mod service;

pub use config::{LogFormat, ServiceConfig};
pub use error::ApiError;
pub use service::{AppState, build_router, create_app};
