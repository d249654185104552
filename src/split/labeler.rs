//! Training-set construction
//!
//! Runs pages through feature extraction and the oracle. Each page either
//! becomes a training example, is reported as a single page, or is excluded
//! with its error; one bad page never fails the batch. Nothing is retried
//! here.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::config::AnalysisConfig;
use super::error::SplitError;
use super::features::{extract_features, FeatureVector, PageContext};
use super::oracle::{Confidence, OracleError, OracleOutcome, SplitOracle};
use super::raster::decode_analysis_image;
use super::train::TrainingExample;

/// A page submitted for labeling
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_id: String,
    /// Storage reference; defaults to the content hash
    pub image_ref: Option<String>,
    /// Encoded image (PNG, JPEG, TIFF)
    pub bytes: Vec<u8>,
    pub context: Option<PageContext>,
}

/// Why a page was excluded
#[derive(Debug, thiserror::Error)]
pub enum LabelError {
    #[error(transparent)]
    Features(#[from] SplitError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Oracle verdict that the page has no gutter
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePageVerdict {
    pub page_id: String,
    pub image_ref: String,
    pub confidence: Confidence,
    pub reasoning: String,
}

/// Result of labeling one page
#[derive(Debug, Clone)]
pub enum PageLabel {
    Example(TrainingExample),
    SinglePage(SinglePageVerdict),
}

/// Page excluded from the training set
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelFailure {
    pub page_id: String,
    pub error: String,
}

/// Outcome of a labeling batch
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelingReport {
    pub examples: Vec<TrainingExample>,
    pub single_pages: Vec<SinglePageVerdict>,
    pub failures: Vec<LabelFailure>,
}

/// Content-addressed image reference
pub fn content_ref(bytes: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(bytes)))
}

/// Decode and featurize on the blocking pool
pub async fn featurize_bytes(
    bytes: Arc<Vec<u8>>,
    context: Option<PageContext>,
    config: &AnalysisConfig,
) -> Result<FeatureVector, SplitError> {
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let buffer = decode_analysis_image(&bytes, config.analysis_width)?;
        extract_features(&buffer, context.as_ref(), &config)
    })
    .await
    .map_err(|e| SplitError::Worker(e.to_string()))?
}

/// Featurize one page and ask the oracle for its label
///
/// Features are computed first so undecodable images fail before the
/// oracle is paid for.
pub async fn label_page(
    oracle: &dyn SplitOracle,
    page: PageImage,
    config: &AnalysisConfig,
) -> Result<PageLabel, LabelError> {
    let image_ref = page
        .image_ref
        .clone()
        .unwrap_or_else(|| content_ref(&page.bytes));
    let bytes = Arc::new(page.bytes);

    let features = featurize_bytes(Arc::clone(&bytes), page.context, config).await?;
    let outcome = oracle.label_split(&bytes).await?;

    let label = match outcome {
        OracleOutcome::Split(label) => {
            tracing::debug!(
                page_id = %page.page_id,
                position = label.position,
                confidence = label.confidence.as_str(),
                "Oracle labeled spread"
            );
            PageLabel::Example(TrainingExample::new(
                &page.page_id,
                &image_ref,
                features,
                label,
            ))
        }
        OracleOutcome::SinglePage {
            confidence,
            reasoning,
        } => {
            tracing::debug!(page_id = %page.page_id, "Oracle reported a single page");
            PageLabel::SinglePage(SinglePageVerdict {
                page_id: page.page_id,
                image_ref,
                confidence,
                reasoning,
            })
        }
    };
    Ok(label)
}

/// Label a batch of pages with at most `concurrency` oracle calls in flight
pub async fn label_pages(
    oracle: Arc<dyn SplitOracle>,
    pages: Vec<PageImage>,
    config: &AnalysisConfig,
    concurrency: usize,
) -> LabelingReport {
    let total = pages.len();
    tracing::info!(total, oracle = oracle.name(), concurrency, "Labeling pages");

    let results: Vec<(String, Result<PageLabel, LabelError>)> = stream::iter(pages)
        .map(|page| {
            let oracle = Arc::clone(&oracle);
            let config = config.clone();
            async move {
                let page_id = page.page_id.clone();
                let result = label_page(oracle.as_ref(), page, &config).await;
                (page_id, result)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = LabelingReport::default();
    for (page_id, result) in results {
        match result {
            Ok(PageLabel::Example(example)) => report.examples.push(example),
            Ok(PageLabel::SinglePage(verdict)) => report.single_pages.push(verdict),
            Err(e) => {
                tracing::warn!(page_id = %page_id, error = %e, "Excluding page from training set");
                report.failures.push(LabelFailure {
                    page_id,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        total,
        examples = report.examples.len(),
        single_pages = report.single_pages.len(),
        failures = report.failures.len(),
        "Labeling finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::oracle::{MockOracle, SplitLabel};
    use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
    use std::io::Cursor;

    fn spread_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(400, 280, |x, _| {
            if (198..204).contains(&x) {
                Luma([25])
            } else {
                Luma([235])
            }
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn page(id: &str, bytes: Vec<u8>) -> PageImage {
        PageImage {
            page_id: id.to_string(),
            image_ref: None,
            bytes,
            context: Some(PageContext::new(12, 200)),
        }
    }

    fn split_oracle(position: u16) -> MockOracle {
        MockOracle {
            response: Ok(OracleOutcome::Split(SplitLabel {
                position,
                confidence: Confidence::High,
                reasoning: "shadow".to_string(),
            })),
            available: true,
        }
    }

    #[test]
    fn test_content_ref_is_stable() {
        let a = content_ref(b"page bytes");
        assert_eq!(a, content_ref(b"page bytes"));
        assert!(a.starts_with("sha256:"));
        assert_eq!(a.len(), "sha256:".len() + 64);
    }

    #[tokio::test]
    async fn test_label_page_builds_example() {
        let oracle = split_oracle(503);
        let label = label_page(&oracle, page("p-1", spread_png()), &AnalysisConfig::default())
            .await
            .unwrap();

        match label {
            PageLabel::Example(example) => {
                assert_eq!(example.page_id, "p-1");
                assert_eq!(example.label.position, 503);
                assert!(example.image_ref.starts_with("sha256:"));
                assert!(example.is_valid());
                assert!((example.features.gutter_position - 50.0).abs() < 1.0);
            }
            other => panic!("unexpected label {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_image_fails_before_oracle() {
        let oracle = split_oracle(500);
        let config = AnalysisConfig::default();
        let result = label_page(&oracle, page("bad", b"nope".to_vec()), &config).await;
        assert!(matches!(result, Err(LabelError::Features(SplitError::ImageDecode(_)))));
    }

    #[tokio::test]
    async fn test_batch_degrades_per_page() {
        let oracle: Arc<dyn SplitOracle> = Arc::new(split_oracle(498));
        let pages = vec![
            page("good-1", spread_png()),
            page("broken", b"garbage".to_vec()),
            page("good-2", spread_png()),
        ];

        let report = label_pages(oracle, pages, &AnalysisConfig::default(), 2).await;

        assert_eq!(report.examples.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].page_id, "broken");
        assert!(report.single_pages.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_oracle_output_is_excluded() {
        let oracle: Arc<dyn SplitOracle> = Arc::new(MockOracle {
            response: Err("not json".to_string()),
            available: true,
        });

        let pages = vec![page("p", spread_png())];
        let report = label_pages(oracle, pages, &AnalysisConfig::default(), 1).await;

        assert!(report.examples.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("Malformed"));
    }

    #[tokio::test]
    async fn test_single_page_is_reported_separately() {
        let oracle: Arc<dyn SplitOracle> = Arc::new(MockOracle {
            response: Ok(OracleOutcome::SinglePage {
                confidence: Confidence::Medium,
                reasoning: "one page".to_string(),
            }),
            available: true,
        });

        let pages = vec![page("p", spread_png())];
        let report = label_pages(oracle, pages, &AnalysisConfig::default(), 4).await;

        assert!(report.examples.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.single_pages.len(), 1);
    }
}
