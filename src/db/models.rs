//! Split model database operations

use serde::Serialize;
use sqlx::SqlitePool;

use super::parse_timestamp;
use crate::error::{AppError, Result};
use crate::split::{ModelRecord, SplitWeights};

/// Stored model row
#[derive(Debug, Clone, sqlx::FromRow)]
struct ModelRow {
    id: String,
    schema_version: i64,
    feature_names: String,
    weights: String,
    training_size: i64,
    validation_size: i64,
    validation_mse: f64,
    trained_at: String,
    is_active: bool,
}

/// A model record along with its activation flag
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredModel {
    #[serde(flatten)]
    pub record: ModelRecord,
    pub active: bool,
}

impl ModelRow {
    fn decode(row: Self) -> Result<StoredModel> {
        let feature_names: Vec<String> = serde_json::from_str(&row.feature_names)?;
        let weights: SplitWeights = serde_json::from_str(&row.weights)?;

        Ok(StoredModel {
            record: ModelRecord {
                id: row.id,
                schema_version: to_count(row.schema_version)?,
                feature_names,
                weights,
                training_size: to_count(row.training_size)?,
                validation_size: to_count(row.validation_size)?,
                validation_mse: row.validation_mse,
                trained_at: parse_timestamp(&row.trained_at)?,
            },
            active: row.is_active,
        })
    }
}

fn to_count<T: TryFrom<i64>>(value: i64) -> Result<T> {
    T::try_from(value)
        .map_err(|_| AppError::Internal(format!("Stored count out of range: {}", value)))
}

const SELECT_MODEL: &str = r#"
    SELECT id, schema_version, feature_names, weights, training_size,
           validation_size, validation_mse, trained_at, is_active
    FROM split_models
"#;

/// Model repository
pub struct ModelRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ModelRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a freshly trained model (inactive)
    pub async fn insert(&self, record: &ModelRecord) -> Result<StoredModel> {
        sqlx::query(
            r#"
            INSERT INTO split_models (id, schema_version, feature_names, weights, training_size,
                                      validation_size, validation_mse, trained_at, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0)
            "#,
        )
        .bind(&record.id)
        .bind(record.schema_version as i64)
        .bind(serde_json::to_string(&record.feature_names)?)
        .bind(serde_json::to_string(&record.weights)?)
        .bind(record.training_size as i64)
        .bind(record.validation_size as i64)
        .bind(record.validation_mse)
        .bind(record.trained_at.to_rfc3339())
        .execute(self.pool)
        .await?;

        Ok(StoredModel {
            record: record.clone(),
            active: false,
        })
    }

    /// Get a specific model
    pub async fn get(&self, id: &str) -> Result<Option<StoredModel>> {
        let row = sqlx::query_as::<_, ModelRow>(&format!("{} WHERE id = ?", SELECT_MODEL))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(ModelRow::decode).transpose()
    }

    /// List all models, newest first
    pub async fn list(&self) -> Result<Vec<StoredModel>> {
        let rows = sqlx::query_as::<_, ModelRow>(&format!(
            "{} ORDER BY trained_at DESC, rowid DESC",
            SELECT_MODEL
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(ModelRow::decode).collect()
    }

    /// The model currently used for inference, if any
    pub async fn active(&self) -> Result<Option<StoredModel>> {
        let row = sqlx::query_as::<_, ModelRow>(&format!("{} WHERE is_active = 1", SELECT_MODEL))
            .fetch_optional(self.pool)
            .await?;

        row.map(ModelRow::decode).transpose()
    }

    /// Make a model the active one, deactivating the previous one
    ///
    /// Returns false when no model has the given id.
    pub async fn activate(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM split_models WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_none() {
            return Ok(false);
        }

        sqlx::query("UPDATE split_models SET is_active = 0 WHERE is_active = 1")
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE split_models SET is_active = 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(model_id = %id, "Activated split model");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_pool;

    fn record(bias: f64) -> ModelRecord {
        ModelRecord::new(SplitWeights::with_bias(bias), 8, 2, 1.5)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let (_dir, pool) = temp_pool().await;
        let repo = ModelRepository::new(&pool);

        let model = record(512.0);
        repo.insert(&model).await.unwrap();

        let stored = repo.get(&model.id).await.unwrap().unwrap();
        assert_eq!(stored.record.id, model.id);
        assert_eq!(stored.record.weights, model.weights);
        assert_eq!(stored.record.training_size, 8);
        assert!(!stored.active);
        assert!(stored.record.validate().is_ok());

        assert!(repo.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activation_is_exclusive() {
        let (_dir, pool) = temp_pool().await;
        let repo = ModelRepository::new(&pool);

        let first = record(480.0);
        let second = record(520.0);
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();
        assert!(repo.active().await.unwrap().is_none());

        assert!(repo.activate(&first.id).await.unwrap());
        assert_eq!(repo.active().await.unwrap().unwrap().record.id, first.id);

        assert!(repo.activate(&second.id).await.unwrap());
        assert_eq!(repo.active().await.unwrap().unwrap().record.id, second.id);

        let active_count = repo.list().await.unwrap().iter().filter(|m| m.active).count();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn test_activate_unknown_keeps_current() {
        let (_dir, pool) = temp_pool().await;
        let repo = ModelRepository::new(&pool);

        let model = record(500.0);
        repo.insert(&model).await.unwrap();
        repo.activate(&model.id).await.unwrap();

        assert!(!repo.activate("nope").await.unwrap());
        assert_eq!(repo.active().await.unwrap().unwrap().record.id, model.id);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let (_dir, pool) = temp_pool().await;
        let repo = ModelRepository::new(&pool);

        let mut older = record(490.0);
        older.trained_at = older.trained_at - chrono::Duration::hours(1);
        let newer = record(510.0);
        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().into_iter().map(|m| m.record.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
