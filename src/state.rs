//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::split::SplitOracle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    oracle: Arc<dyn SplitOracle>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, db: SqlitePool, oracle: Arc<dyn SplitOracle>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, db, oracle }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Get the labeling oracle
    pub fn oracle(&self) -> Arc<dyn SplitOracle> {
        Arc::clone(&self.inner.oracle)
    }
}
