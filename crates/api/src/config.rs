//! Server configuration

use crate::ServerError;
use std::net::SocketAddr;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 86_400;
pub const DEFAULT_POMODORO_MINUTES: u32 = 25;
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Shortest accepted signing secret, in bytes
pub const MIN_SECRET_LEN: usize = 16;

/// Runtime settings for the HTTP server
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: SocketAddr,
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    /// Length a pomodoro timer must reach to count as completed
    pub pomodoro_minutes: u32,
    pub max_body_bytes: usize,
}

impl ApiConfig {
    /// Configuration with defaults for everything except the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            jwt_secret: jwt_secret.into(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            pomodoro_minutes: DEFAULT_POMODORO_MINUTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn pomodoro_length(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.pomodoro_minutes))
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ServerError::Config(format!(
                "JWT secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.token_ttl_secs == 0 {
            return Err(ServerError::Config("token TTL must be positive".to_string()));
        }
        if self.pomodoro_minutes == 0 {
            return Err(ServerError::Config(
                "pomodoro length must be at least one minute".to_string(),
            ));
        }
        Ok(())
    }
}
