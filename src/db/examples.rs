//! Training example database operations

use sqlx::SqlitePool;

use super::parse_timestamp;
use crate::error::{AppError, Result};
use crate::split::{Confidence, FeatureVector, SplitLabel, TrainingExample};

#[derive(Debug, Clone, sqlx::FromRow)]
struct ExampleRow {
    id: String,
    page_id: String,
    image_ref: String,
    features: String,
    split_position: i64,
    confidence: String,
    reasoning: String,
    created_at: String,
}

impl ExampleRow {
    fn decode(row: Self) -> Result<TrainingExample> {
        let features: FeatureVector = serde_json::from_str(&row.features)?;
        let position = u16::try_from(row.split_position).map_err(|_| {
            AppError::Internal(format!(
                "Stored split position out of range: {}",
                row.split_position
            ))
        })?;
        let confidence: Confidence = row
            .confidence
            .parse()
            .map_err(|e| AppError::Internal(format!("Stored confidence: {}", e)))?;

        Ok(TrainingExample {
            id: row.id,
            page_id: row.page_id,
            image_ref: row.image_ref,
            features,
            label: SplitLabel {
                position,
                confidence,
                reasoning: row.reasoning,
            },
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

/// Training example repository
pub struct ExampleRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ExampleRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a batch of labeled examples in one transaction
    pub async fn insert_all(&self, examples: &[TrainingExample]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for example in examples {
            sqlx::query(
                r#"
                INSERT INTO training_examples (id, page_id, image_ref, features, split_position,
                                               confidence, reasoning, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&example.id)
            .bind(&example.page_id)
            .bind(&example.image_ref)
            .bind(serde_json::to_string(&example.features)?)
            .bind(example.label.position as i64)
            .bind(example.label.confidence.as_str())
            .bind(&example.label.reasoning)
            .bind(example.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// All decodable stored examples, oldest first
    pub async fn list(&self) -> Result<Vec<TrainingExample>> {
        let (examples, _skipped) = self.list_for_training().await?;
        Ok(examples)
    }

    /// Decodable stored examples plus the number of rows that failed to decode
    ///
    /// Rows written under an older feature schema are skipped rather than
    /// failing the whole listing; validity filtering is left to the trainer.
    pub async fn list_for_training(&self) -> Result<(Vec<TrainingExample>, usize)> {
        let rows = sqlx::query_as::<_, ExampleRow>(
            r#"
            SELECT id, page_id, image_ref, features, split_position,
                   confidence, reasoning, created_at
            FROM training_examples
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        let mut examples = Vec::with_capacity(rows.len());
        let mut skipped = 0;
        for row in rows {
            let id = row.id.clone();
            match ExampleRow::decode(row) {
                Ok(example) => examples.push(example),
                Err(e) => {
                    tracing::warn!(
                        example_id = %id,
                        error = %e,
                        "Skipping undecodable training example"
                    );
                    skipped += 1;
                }
            }
        }

        Ok((examples, skipped))
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM training_examples")
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }
}
