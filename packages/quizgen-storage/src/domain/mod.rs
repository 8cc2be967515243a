//! Port traits for the pipeline's storage boundary
//!
//! The pipeline core depends on these traits only; adapters live in
//! `infrastructure`. Both sides of the boundary speak the shared
//! `PipelineError` taxonomy, so the orchestrator can make retry decisions
//! without knowing which adapter is behind the trait object.

use async_trait::async_trait;

use quizgen_core::{ContentFragment, Question, Result};

/// Read side: ordered content fragments for an upload
///
/// # Contract
///
/// `fetch_fragments` returns fragments in ascending `order_index`. An
/// upload with zero fragments is a `NotFound` error, not an empty vector;
/// connectivity or query failures are `StoreUnavailable`. Read-only, no
/// side effects.
#[async_trait]
pub trait FragmentStore: Send + Sync {
    async fn fetch_fragments(&self, upload_id: &str) -> Result<Vec<ContentFragment>>;
}

/// Write side: idempotent question persistence
///
/// # Contract
///
/// `persist_questions` is all-or-nothing per call and idempotent under
/// retry: re-persisting the same question id must not create a duplicate
/// (upsert-by-id). A question referencing a non-existent upload fails the
/// whole batch with `WriteConflict`; transient store errors are
/// `StoreUnavailable` and may be retried by the caller.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Check whether an upload exists.
    async fn upload_exists(&self, upload_id: &str) -> Result<bool>;

    /// Upsert a batch of questions inside one transaction.
    ///
    /// Returns the number of rows written.
    async fn persist_questions(&self, questions: &[Question]) -> Result<usize>;

    /// All persisted questions for an upload, in stable (id) order.
    ///
    /// Used by the loser of a same-upload race to reuse the winner's
    /// result instead of regenerating.
    async fn questions_for_upload(&self, upload_id: &str) -> Result<Vec<Question>>;

    /// Cheap connectivity probe.
    async fn health_check(&self) -> Result<()>;
}
