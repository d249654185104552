//! Spread analysis and labeling routes

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::db::{ExampleRepository, ModelRepository};
use crate::error::{AppError, Result};
use crate::split::{
    featurize_bytes, label_page, label_pages, predict, FeatureVector, LabelingReport, PageContext,
    PageImage, PageLabel, SinglePageVerdict, TrainingExample,
};
use crate::state::AppState;

/// Upper bound on concurrent oracle calls for one batch
const MAX_LABEL_CONCURRENCY: usize = 8;

/// Create the spreads router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/features", post(features))
        .route("/split", post(split))
        .route("/label", post(label))
        .route("/label/batch", post(label_batch))
}

/// Optional position of the page within its book
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl PageQuery {
    fn context(&self) -> Result<Option<PageContext>> {
        page_context(self.page, self.total_pages)
    }
}

fn page_context(page: Option<u32>, total_pages: Option<u32>) -> Result<Option<PageContext>> {
    match (page, total_pages) {
        (None, None) => Ok(None),
        (Some(page), Some(total)) if page >= 1 && page <= total => {
            Ok(Some(PageContext::new(page, total)))
        }
        (Some(page), Some(total)) => Err(AppError::BadRequest(format!(
            "page {} is outside 1..={}",
            page, total
        ))),
        _ => Err(AppError::BadRequest(
            "page and total_pages must be given together".to_string(),
        )),
    }
}

fn require_body(body: &Bytes) -> Result<()> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Request body must contain an image".to_string()));
    }
    Ok(())
}

/// Compute the feature vector for an uploaded spread
async fn features(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    body: Bytes,
) -> Result<Json<FeatureVector>> {
    require_body(&body)?;
    let context = query.context()?;

    let features =
        featurize_bytes(Arc::new(body.to_vec()), context, &state.config().analysis).await?;
    Ok(Json(features))
}

/// Split prediction response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResponse {
    /// Cut position on the 0-1000 scale
    pub split_position: u16,
    pub model_id: String,
    pub features: FeatureVector,
}

/// Predict where to cut an uploaded spread using the active model
async fn split(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    body: Bytes,
) -> Result<Json<SplitResponse>> {
    require_body(&body)?;
    let context = query.context()?;

    let model = ModelRepository::new(state.db())
        .active()
        .await?
        .ok_or_else(|| AppError::Conflict("No active split model".to_string()))?
        .record;
    model.validate()?;

    let features =
        featurize_bytes(Arc::new(body.to_vec()), context, &state.config().analysis).await?;
    let split_position = predict(&features, &model, &state.config().estimator);

    tracing::debug!(
        model_id = %model.id,
        split_position,
        gutter_position = features.gutter_position,
        "Predicted split"
    );

    Ok(Json(SplitResponse {
        split_position,
        model_id: model.id,
        features,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LabelQuery {
    pub page_id: Option<String>,
    pub image_ref: Option<String>,
    pub page: Option<u32>,
    pub total_pages: Option<u32>,
}

/// Result of labeling one page
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LabelResponse {
    Example(TrainingExample),
    SinglePage(SinglePageVerdict),
}

/// Ask the oracle for the split of one page and store it as a training example
async fn label(
    State(state): State<AppState>,
    Query(query): Query<LabelQuery>,
    body: Bytes,
) -> Result<Json<LabelResponse>> {
    require_body(&body)?;
    let context = page_context(query.page, query.total_pages)?;

    let page = PageImage {
        page_id: query.page_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        image_ref: query.image_ref,
        bytes: body.to_vec(),
        context,
    };

    let oracle = state.oracle();
    let response = match label_page(oracle.as_ref(), page, &state.config().analysis).await? {
        PageLabel::Example(example) => {
            ExampleRepository::new(state.db())
                .insert_all(std::slice::from_ref(&example))
                .await?;
            tracing::info!(
                page_id = %example.page_id,
                position = example.label.position,
                "Stored training example"
            );
            LabelResponse::Example(example)
        }
        PageLabel::SinglePage(verdict) => LabelResponse::SinglePage(verdict),
    };

    Ok(Json(response))
}

/// One page of a batch labeling request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPage {
    pub page_id: String,
    /// Base64-encoded image
    pub image: String,
    pub image_ref: Option<String>,
    pub page: Option<u32>,
    pub total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchLabelRequest {
    pub pages: Vec<BatchPage>,
    pub concurrency: Option<usize>,
}

/// Label many pages; failures are reported per page
async fn label_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchLabelRequest>,
) -> Result<Json<LabelingReport>> {
    let pages = request
        .pages
        .into_iter()
        .map(|page| -> Result<PageImage> {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(page.image.as_bytes())
                .map_err(|e| {
                    AppError::BadRequest(format!(
                        "Page {}: invalid base64 image: {}",
                        page.page_id, e
                    ))
                })?;
            Ok(PageImage {
                context: page_context(page.page, page.total_pages)?,
                page_id: page.page_id,
                image_ref: page.image_ref,
                bytes,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let concurrency = request.concurrency.unwrap_or(4).clamp(1, MAX_LABEL_CONCURRENCY);
    let report = label_pages(state.oracle(), pages, &state.config().analysis, concurrency).await;

    ExampleRepository::new(state.db())
        .insert_all(&report.examples)
        .await?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_context_requires_both_values() {
        assert!(page_context(None, None).unwrap().is_none());
        assert!(page_context(Some(3), None).is_err());
        assert!(page_context(None, Some(10)).is_err());
    }

    #[test]
    fn test_page_context_range() {
        let context = page_context(Some(1), Some(10)).unwrap().unwrap();
        assert_eq!(context.page_number, 1);
        assert!(page_context(Some(0), Some(10)).is_err());
        assert!(page_context(Some(11), Some(10)).is_err());
    }
}
