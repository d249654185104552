//! Health check routes

use std::time::Duration;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::split::SplitOracle;
use crate::state::AppState;

/// Longest the health check waits on the oracle
const ORACLE_CHECK_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    oracle: OracleStatus,
}

#[derive(Serialize)]
pub struct OracleStatus {
    name: String,
    available: bool,
}

/// Liveness plus oracle reachability; the server stays healthy without an oracle
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let oracle = state.oracle();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        oracle: OracleStatus {
            name: oracle.name().to_string(),
            available: oracle_reachable(oracle.as_ref(), ORACLE_CHECK_TIMEOUT).await,
        },
    })
}

/// Oracle availability, reported as unavailable once `limit` elapses
async fn oracle_reachable(oracle: &dyn SplitOracle, limit: Duration) -> bool {
    match tokio::time::timeout(limit, oracle.is_available()).await {
        Ok(available) => available,
        Err(_) => {
            tracing::warn!(
                oracle = oracle.name(),
                timeout_ms = limit.as_millis() as u64,
                "Oracle availability check timed out"
            );
            false
        }
    }
}
