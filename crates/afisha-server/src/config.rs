use std::env;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8000";
pub const DEFAULT_DATABASE: &str = "afisha.sqlite3";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database: String,
    pub source_url: String,
    /// Bearer token for write endpoints. Writes are refused when unset.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),
            database: env::var("AFISHA_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string()),
            source_url: env::var("AFISHA_SOURCE_URL")
                .unwrap_or_else(|_| afisha::BASE_URL.to_string()),
            admin_token: env::var("AFISHA_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
        }
    }
}
