//! PostgreSQL storage adapter
//!
//! Connection pooling via `PgPool`; all statements are parameterized.
//! Schema migrations live under `migrations/` and are run manually with
//! `sqlx migrate run` to keep sqlx-cli out of the build dependencies.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::debug;

use quizgen_core::{ContentFragment, PipelineError, Question, QuestionType, Result};

use crate::domain::{FragmentStore, QuestionStore};

/// PostgreSQL-backed fragment and question store
pub struct PgStore {
    /// Connection pool shared by concurrent pipeline runs
    pool: PgPool,
}

impl PgStore {
    /// Connect with pooling.
    ///
    /// # Arguments
    /// * `database_url` - connection string, e.g. `postgres://localhost/quizgen`
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!("failed to connect to PostgreSQL: {}", e))
                    .with_source(e)
            })?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (shared with other components).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }

    fn row_to_fragment(row: &PgRow) -> Result<ContentFragment> {
        Ok(ContentFragment {
            upload_id: row
                .try_get("upload_id")
                .map_err(|e| PipelineError::parse(format!("missing upload_id: {}", e)))?,
            order_index: row
                .try_get::<i32, _>("order_index")
                .map_err(|e| PipelineError::parse(format!("missing order_index: {}", e)))?,
            text: row
                .try_get("text_content")
                .map_err(|e| PipelineError::parse(format!("missing text_content: {}", e)))?,
        })
    }

    fn row_to_question(row: &PgRow) -> Result<Question> {
        let question_type: String = row
            .try_get("question_type")
            .map_err(|e| PipelineError::parse(format!("missing question_type: {}", e)))?;
        let correct_index: i32 = row
            .try_get("correct_index")
            .map_err(|e| PipelineError::parse(format!("missing correct_index: {}", e)))?;

        Ok(Question {
            id: row
                .try_get("id")
                .map_err(|e| PipelineError::parse(format!("missing id: {}", e)))?,
            upload_id: row
                .try_get("upload_id")
                .map_err(|e| PipelineError::parse(format!("missing upload_id: {}", e)))?,
            question_text: row
                .try_get("question_text")
                .map_err(|e| PipelineError::parse(format!("missing question_text: {}", e)))?,
            question_type: QuestionType::from_str(&question_type)?,
            options: row
                .try_get("options")
                .map_err(|e| PipelineError::parse(format!("missing options: {}", e)))?,
            correct_index: correct_index.max(0) as usize,
            answer_explanation: row.try_get("answer_explanation").ok().flatten(),
        })
    }
}

/// PostgreSQL error code for foreign-key violations.
const FK_VIOLATION: &str = "23503";

/// A persist failure is a `WriteConflict` exactly when the database
/// rejected a foreign key, i.e. a question referenced a missing upload.
fn is_fk_violation(code: Option<&str>) -> bool {
    code == Some(FK_VIOLATION)
}

fn map_persist_error(upload_id: &str, e: sqlx::Error) -> PipelineError {
    let fk = match &e {
        sqlx::Error::Database(db) => is_fk_violation(db.code().as_deref()),
        _ => false,
    };

    if fk {
        PipelineError::write_conflict(
            upload_id,
            format!("question references non-existent upload: {}", upload_id),
        )
        .with_source(e)
    } else {
        PipelineError::store_unavailable(format!("failed to persist questions: {}", e))
            .with_upload_id(upload_id)
            .with_source(e)
    }
}

#[async_trait]
impl FragmentStore for PgStore {
    async fn fetch_fragments(&self, upload_id: &str) -> Result<Vec<ContentFragment>> {
        let rows = sqlx::query(
            r#"
            SELECT upload_id, order_index, text_content
            FROM content_fragments
            WHERE upload_id = $1
            ORDER BY order_index ASC
            "#,
        )
        .bind(upload_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            PipelineError::store_unavailable(format!("failed to fetch fragments: {}", e))
                .with_upload_id(upload_id)
                .with_source(e)
        })?;

        if rows.is_empty() {
            return Err(PipelineError::not_found(upload_id));
        }

        debug!(upload_id, fragment_count = rows.len(), "fetched fragments");
        rows.iter().map(Self::row_to_fragment).collect()
    }
}

#[async_trait]
impl QuestionStore for PgStore {
    async fn upload_exists(&self, upload_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM uploads WHERE id = $1")
            .bind(upload_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!("failed to check upload: {}", e))
                    .with_upload_id(upload_id)
                    .with_source(e)
            })?;

        Ok(row.is_some())
    }

    async fn persist_questions(&self, questions: &[Question]) -> Result<usize> {
        if questions.is_empty() {
            return Ok(0);
        }
        let upload_id = questions[0].upload_id.clone();

        // One transaction per batch: a run's question set lands
        // all-or-nothing.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_persist_error(&upload_id, e))?;

        for question in questions {
            sqlx::query(
                r#"
                INSERT INTO questions (
                    id, upload_id, question_text, question_type,
                    options, correct_index, answer_explanation
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    question_text = EXCLUDED.question_text,
                    question_type = EXCLUDED.question_type,
                    options = EXCLUDED.options,
                    correct_index = EXCLUDED.correct_index,
                    answer_explanation = EXCLUDED.answer_explanation,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(&question.id)
            .bind(&question.upload_id)
            .bind(&question.question_text)
            .bind(question.question_type.as_str())
            .bind(&question.options)
            .bind(question.correct_index as i32)
            .bind(&question.answer_explanation)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_persist_error(&question.upload_id, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_persist_error(&upload_id, e))?;

        debug!(
            upload_id = %upload_id,
            count = questions.len(),
            "persisted questions"
        );
        Ok(questions.len())
    }

    async fn questions_for_upload(&self, upload_id: &str) -> Result<Vec<Question>> {
        let rows = sqlx::query(
            r#"
            SELECT id, upload_id, question_text, question_type,
                   options, correct_index, answer_explanation
            FROM questions
            WHERE upload_id = $1
            ORDER BY id
            "#,
        )
        .bind(upload_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            PipelineError::store_unavailable(format!("failed to load questions: {}", e))
                .with_upload_id(upload_id)
                .with_source(e)
        })?;

        rows.iter().map(Self::row_to_question).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!("health check failed: {}", e))
                    .with_source(e)
            })?;
        Ok(())
    }
}
