use std::sync::Arc;

use sqlx::PgPool;

use crate::auth::{GoogleVerifier, TokenService};
use crate::Config;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub tokens: Arc<TokenService>,
    pub google: Arc<GoogleVerifier>,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        // ---
        AppState {
            tokens: Arc::new(TokenService::from_config(&config)),
            google: Arc::new(GoogleVerifier::from_config(&config)),
            config: Arc::new(config),
            pool,
        }
    }
}
