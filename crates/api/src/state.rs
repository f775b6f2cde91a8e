//! Shared handler state

use crate::auth::TokenService;
use crate::config::ApiConfig;
use std::sync::Arc;
use tasktrack_db::Database;

/// Dependencies shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<ApiConfig>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.token_ttl_secs);
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            tokens: Arc::new(tokens),
        }
    }
}

static_assertions::assert_impl_all!(AppState: Send, Sync, Clone);
