//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL)
        .execute(pool)
        .await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Trained split models (immutable apart from the active flag)
CREATE TABLE IF NOT EXISTS split_models (
    id TEXT PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    feature_names TEXT NOT NULL,
    weights TEXT NOT NULL,
    training_size INTEGER NOT NULL,
    validation_size INTEGER NOT NULL,
    validation_mse REAL NOT NULL,
    trained_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_split_models_trained_at ON split_models(trained_at);
CREATE UNIQUE INDEX IF NOT EXISTS idx_split_models_single_active
    ON split_models(is_active) WHERE is_active = 1;

-- Oracle-labeled training examples
CREATE TABLE IF NOT EXISTS training_examples (
    id TEXT PRIMARY KEY,
    page_id TEXT NOT NULL,
    image_ref TEXT NOT NULL,
    features TEXT NOT NULL,
    split_position INTEGER NOT NULL,
    confidence TEXT NOT NULL,
    reasoning TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_training_examples_page ON training_examples(page_id);
CREATE INDEX IF NOT EXISTS idx_training_examples_image ON training_examples(image_ref);
"#;
