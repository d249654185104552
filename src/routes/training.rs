//! Training example routes

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::db::ExampleRepository;
use crate::error::Result;
use crate::split::TrainingExample;
use crate::state::AppState;

/// Create the training router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/examples", get(list_examples))
        .route("/examples/count", get(count_examples))
}

/// List stored training examples
async fn list_examples(State(state): State<AppState>) -> Result<Json<Vec<TrainingExample>>> {
    let examples = ExampleRepository::new(state.db()).list().await?;
    Ok(Json(examples))
}

#[derive(Serialize)]
struct CountResponse {
    count: i64,
}

async fn count_examples(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = ExampleRepository::new(state.db()).count().await?;
    Ok(Json(CountResponse { count }))
}
