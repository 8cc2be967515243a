//! Pipeline orchestrator
//!
//! Sequences fetch → aggregate → generate → persist for one upload.
//! The steps run strictly in order: each depends on the prior step's full
//! output, so there is no internal parallelism. Concurrent runs for
//! different uploads proceed independently; runs for the same upload are
//! serialized through a per-upload lock, and the loser of that race reuses
//! the winner's persisted questions instead of regenerating.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use quizgen_core::{aggregate, PipelineError, Question, Result};
use quizgen_storage::{FragmentStore, QuestionStore};

use crate::config::PipelineConfig;
use crate::generator::QuestionGenerator;
use crate::run::{PipelineRun, Step};

/// Outcome of a successful pipeline run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub upload_id: String,
    /// The full persisted question set
    pub questions: Vec<Question>,
    pub question_ids: Vec<String>,
    pub question_count: usize,
    pub duration_ms: u64,
    /// True when an earlier run's persisted result was reused instead of
    /// generating again
    pub reused: bool,
}

/// Pipeline orchestrator
///
/// Holds the store ports and the generator strategy behind trait objects;
/// the single entry point is [`generate_questions`].
///
/// [`generate_questions`]: PipelineOrchestrator::generate_questions
pub struct PipelineOrchestrator {
    fragments: Arc<dyn FragmentStore>,
    questions: Arc<dyn QuestionStore>,
    generator: Arc<dyn QuestionGenerator>,
    config: PipelineConfig,
    /// Per-upload serialization guards. Entries are created on first use
    /// and live for the orchestrator's lifetime.
    upload_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl PipelineOrchestrator {
    pub fn new(
        fragments: Arc<dyn FragmentStore>,
        questions: Arc<dyn QuestionStore>,
        generator: Arc<dyn QuestionGenerator>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fragments,
            questions,
            generator,
            config,
            upload_locks: DashMap::new(),
        })
    }

    /// Run the full pipeline for one upload (main entry point).
    ///
    /// Returns either the full persisted question set or a single
    /// structured error naming the failure kind and upload id; never a
    /// partial set. Cancellation is observed at step boundaries.
    pub async fn generate_questions(
        &self,
        upload_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        let started = Instant::now();

        let lock = self
            .upload_locks
            .entry(upload_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // A concurrent run for this upload may have finished while we
        // waited on the lock; reuse its result rather than regenerating.
        let existing = self.questions.questions_for_upload(upload_id).await?;
        if !existing.is_empty() {
            info!(
                upload_id,
                question_count = existing.len(),
                "reusing previously persisted questions"
            );
            return Ok(Self::report_from_existing(upload_id, existing, started));
        }

        let mut run = PipelineRun::new(upload_id);
        info!(
            run_id = %run.id,
            upload_id,
            generator = self.generator.name(),
            "starting pipeline run"
        );

        // Fetching
        self.ensure_live(&mut run, Step::Fetching, cancel)?;
        let fragments = match self.fragments.fetch_fragments(upload_id).await {
            Ok(fragments) => fragments,
            Err(e) => return Err(Self::fail(&mut run, Step::Fetching, e)),
        };

        // Aggregating (pure)
        self.ensure_live(&mut run, Step::Aggregating, cancel)?;
        run.begin_aggregating(fragments.len())?;
        let document = aggregate(upload_id, &fragments);
        if document.is_blank() {
            let e = PipelineError::insufficient_content(upload_id);
            return Err(Self::fail(&mut run, Step::Aggregating, e));
        }
        info!(
            run_id = %run.id,
            upload_id,
            fragment_count = fragments.len(),
            document_chars = document.len(),
            "aggregated document"
        );

        // Generating (pure)
        self.ensure_live(&mut run, Step::Generating, cancel)?;
        run.begin_generating(document.len())?;
        let questions = match self
            .generator
            .generate(&document, &self.config.generator)
            .await
        {
            Ok(questions) => questions,
            Err(e) => return Err(Self::fail(&mut run, Step::Generating, e)),
        };
        info!(
            run_id = %run.id,
            upload_id,
            question_count = questions.len(),
            "generated questions"
        );

        // Persisting, with bounded retry on transient store errors only.
        // The store-side transaction keeps each attempt all-or-nothing.
        self.ensure_live(&mut run, Step::Persisting, cancel)?;
        run.begin_persisting(questions.len())?;
        let mut attempt: u32 = 0;
        let persisted = loop {
            match self.questions.persist_questions(&questions).await {
                Ok(count) => break count,
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_retries => {
                    let backoff = self.config.retry.backoff_for(attempt);
                    attempt += 1;
                    run.record_persist_attempt(attempt)?;
                    warn!(
                        run_id = %run.id,
                        upload_id,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "transient persist failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(Self::fail(&mut run, Step::Persisting, e)),
            }
        };

        let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        run.complete(question_ids.clone())?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %run.id,
            upload_id,
            question_count = persisted,
            duration_ms,
            "pipeline run complete"
        );

        Ok(RunReport {
            run_id: run.id,
            upload_id: upload_id.to_string(),
            question_ids,
            question_count: persisted,
            questions,
            duration_ms,
            reused: false,
        })
    }

    /// Cheap connectivity probe, re-exposed for serving layers.
    pub async fn health_check(&self) -> Result<()> {
        self.questions.health_check().await
    }

    /// Observe cancellation at a step boundary: abort before starting the
    /// next step, never mid-write.
    fn ensure_live(
        &self,
        run: &mut PipelineRun,
        step: Step,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            run.cancel(step);
            warn!(run_id = %run.id, upload_id = %run.upload_id, step = %step, "run cancelled");
            return Err(PipelineError::cancelled(&run.upload_id, step.as_str()));
        }
        Ok(())
    }

    fn fail(run: &mut PipelineRun, step: Step, error: PipelineError) -> PipelineError {
        run.fail(step, &error);
        warn!(
            run_id = %run.id,
            upload_id = %run.upload_id,
            step = %step,
            kind = error.kind.as_str(),
            error = %error,
            "pipeline run failed"
        );
        error
    }

    fn report_from_existing(
        upload_id: &str,
        questions: Vec<Question>,
        started: Instant,
    ) -> RunReport {
        let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
        RunReport {
            run_id: Uuid::new_v4(),
            upload_id: upload_id.to_string(),
            question_count: questions.len(),
            question_ids,
            questions,
            duration_ms: started.elapsed().as_millis() as u64,
            reused: true,
        }
    }
}
