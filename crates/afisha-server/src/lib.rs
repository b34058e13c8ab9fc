pub mod config;
pub mod docs;
pub mod error;
pub mod routes;

pub use config::Config;
pub use error::ApiError;
pub use routes::{AppState, router};
