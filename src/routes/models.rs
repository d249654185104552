//! Split model routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::{ExampleRepository, ModelRepository, StoredModel};
use crate::error::{AppError, Result};
use crate::split::{train_model, SplitError};
use crate::state::AppState;

/// Create the models router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_models))
        .route("/train", post(train))
        .route("/active", get(active_model))
        .route("/:id", get(get_model))
        .route("/:id/activate", post(activate_model))
}

/// List all trained models, newest first
async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<StoredModel>>> {
    let models = ModelRepository::new(state.db()).list().await?;
    Ok(Json(models))
}

/// Get a specific model
async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredModel>> {
    ModelRepository::new(state.db())
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", id)))
}

/// Get the model used for inference
async fn active_model(State(state): State<AppState>) -> Result<Json<StoredModel>> {
    ModelRepository::new(state.db())
        .active()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No active split model".to_string()))
}

/// Make a model the active one
async fn activate_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredModel>> {
    let repo = ModelRepository::new(state.db());

    let model = repo
        .get(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Model {} not found", id)))?;
    model.record.validate()?;

    if !repo.activate(&id).await? {
        return Err(AppError::NotFound(format!("Model {} not found", id)));
    }

    Ok(Json(StoredModel {
        active: true,
        ..model
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    /// Activate the new model once stored
    #[serde(default)]
    pub activate: bool,
}

/// Train a new model from every stored example
async fn train(
    State(state): State<AppState>,
    request: Option<Json<TrainRequest>>,
) -> Result<(StatusCode, Json<StoredModel>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let (examples, skipped) = ExampleRepository::new(state.db()).list_for_training().await?;
    tracing::info!(examples = examples.len(), skipped, "Training split model");

    let config = state.config().training.clone();
    let record = tokio::task::spawn_blocking(move || train_model(&examples, &config))
        .await
        .map_err(|e| SplitError::Worker(e.to_string()))?
        .map_err(|e| include_skipped(e, skipped))?;

    let repo = ModelRepository::new(state.db());
    let mut stored = repo.insert(&record).await?;

    if request.activate {
        stored.active = repo.activate(&record.id).await?;
    }

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Count undecodable stored rows in the total reported for insufficient data
fn include_skipped(err: SplitError, skipped: usize) -> SplitError {
    match err {
        SplitError::InsufficientData {
            valid,
            total,
            required,
        } => SplitError::InsufficientData {
            valid,
            total: total + skipped,
            required,
        },
        other => other,
    }
}
