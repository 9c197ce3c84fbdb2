// Runtime settings, loaded from the environment (a .env file is read in main).

use std::env;

/// Answer shown whenever the car bot service cannot be reached.
pub const FALLBACK_MESSAGE: &str = "Something went wrong while contacting the server.";

/// Port used by `carbot serve` when none is given.
pub const DEFAULT_PORT: u16 = 3000;

/// Browser sessions kept by the web UI before the least recently used is dropped.
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

lazy_static::lazy_static! {
    // CARBOT_API_URL wins, LOCAL_API_URL is kept for local development setups.
    pub static ref API_URL: String = env::var("CARBOT_API_URL")
        .or_else(|_| env::var("LOCAL_API_URL"))
        .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
    pub static ref TEMPLATES_DIR: String = env::var("CARBOT_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());
    pub static ref MAX_SESSIONS: usize = env::var("CARBOT_MAX_SESSIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_SESSIONS);
    pub static ref STATIC_DIR: String = env::var("CARBOT_STATIC_DIR").unwrap_or_else(|_| "static".to_string());
}
