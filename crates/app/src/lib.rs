pub mod config;
pub mod error;
pub mod server;

pub use config::{Cli, ServerConfig};
pub use error::ApiError;
pub use server::{app_router, run_server, AppState};
