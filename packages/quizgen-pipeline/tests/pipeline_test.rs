//! End-to-end pipeline tests against the in-memory store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use quizgen_core::{ContentFragment, Document, ErrorKind, PipelineError, Question, Result};
use quizgen_pipeline::{
    GeneratorConfig, MockGenerator, PipelineConfig, PipelineOrchestrator, QuestionGenerator,
    RetryPolicy,
};
use quizgen_storage::{MemoryStore, QuestionStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

/// Fast-retry config so backoff tests stay quick.
fn test_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy {
            max_retries: 3,
            base_backoff_ms: 1,
        },
        ..Default::default()
    }
}

/// Question store wrapper that fails the first N persist calls with a
/// transient error and counts every persist attempt.
struct FlakyStore {
    inner: MemoryStore,
    failures_remaining: AtomicUsize,
    persist_calls: AtomicUsize,
}

impl FlakyStore {
    fn new(inner: MemoryStore, failures: usize) -> Self {
        Self {
            inner,
            failures_remaining: AtomicUsize::new(failures),
            persist_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionStore for FlakyStore {
    async fn upload_exists(&self, upload_id: &str) -> Result<bool> {
        self.inner.upload_exists(upload_id).await
    }

    async fn persist_questions(&self, questions: &[Question]) -> Result<usize> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::store_unavailable("injected outage"));
        }

        self.inner.persist_questions(questions).await
    }

    async fn questions_for_upload(&self, upload_id: &str) -> Result<Vec<Question>> {
        self.inner.questions_for_upload(upload_id).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

/// Generator wrapper that counts invocations.
struct CountingGenerator {
    inner: MockGenerator,
    calls: AtomicUsize,
}

impl CountingGenerator {
    fn new() -> Self {
        Self {
            inner: MockGenerator::new(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl QuestionGenerator for CountingGenerator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn generate(
        &self,
        document: &Document,
        config: &GeneratorConfig,
    ) -> Result<Vec<Question>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate(document, config).await
    }
}

/// Generator that cancels the run's token before returning, so the
/// orchestrator observes cancellation at the persisting boundary.
struct CancellingGenerator {
    inner: MockGenerator,
    token: CancellationToken,
}

#[async_trait]
impl QuestionGenerator for CancellingGenerator {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn generate(
        &self,
        document: &Document,
        config: &GeneratorConfig,
    ) -> Result<Vec<Question>> {
        self.token.cancel();
        self.inner.generate(document, config).await
    }
}

fn seeded_store(upload_id: &str) -> MemoryStore {
    let store = MemoryStore::new();
    store.add_upload(upload_id);
    store.add_fragments([
        ContentFragment::new(upload_id, 0, "Part A."),
        ContentFragment::new(upload_id, 1, "Part B."),
    ]);
    store
}

#[tokio::test]
async fn test_full_pipeline_scenario_u1() {
    init_tracing();
    let store = seeded_store("u1");

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(MockGenerator::new()),
        test_config(),
    )
    .unwrap();

    let report = orchestrator
        .generate_questions("u1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.upload_id, "u1");
    assert_eq!(report.question_count, 1);
    assert_eq!(report.question_ids.len(), 1);

    let q = &report.questions[0];
    assert_eq!(q.options.len(), 4);
    assert_eq!(q.correct_index, 2);

    // The persisted copy matches what the report carries.
    let persisted = store.questions_for_upload("u1").await.unwrap();
    assert_eq!(persisted, report.questions);
}

#[tokio::test]
async fn test_transient_outage_is_retried_until_success() {
    init_tracing();
    let store = seeded_store("u1");
    let flaky = Arc::new(FlakyStore::new(store.clone(), 2));

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        flaky.clone(),
        Arc::new(MockGenerator::new()),
        test_config(),
    )
    .unwrap();

    let report = orchestrator
        .generate_questions("u1", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.question_count, 1);
    // Two failures, then the successful attempt.
    assert_eq!(flaky.persist_calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.question_count(), 1);
}

#[tokio::test]
async fn test_persistent_outage_exhausts_retries() {
    init_tracing();
    let store = seeded_store("u1");
    let flaky = Arc::new(FlakyStore::new(store.clone(), usize::MAX));

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        flaky.clone(),
        Arc::new(MockGenerator::new()),
        test_config(),
    )
    .unwrap();

    let err = orchestrator
        .generate_questions("u1", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::StoreUnavailable);
    // Initial attempt + max_retries.
    assert_eq!(flaky.persist_calls.load(Ordering::SeqCst), 4);
    assert_eq!(store.question_count(), 0);
}

#[tokio::test]
async fn test_write_conflict_is_not_retried() {
    init_tracing();
    // Fragments exist but the upload row does not, so persistence hits a
    // foreign-key conflict.
    let store = MemoryStore::new();
    store.add_fragment(ContentFragment::new("u7", 0, "Part A."));
    let counting = Arc::new(FlakyStore::new(store.clone(), 0));

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        counting.clone(),
        Arc::new(MockGenerator::new()),
        test_config(),
    )
    .unwrap();

    let err = orchestrator
        .generate_questions("u7", &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::WriteConflict);
    assert_eq!(counting.persist_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_same_upload_single_winner() {
    init_tracing();
    let store = seeded_store("u1");
    let generator = Arc::new(CountingGenerator::new());

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            generator.clone(),
            test_config(),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .generate_questions("u1", &CancellationToken::new())
                .await
        }));
    }

    let reports: Vec<_> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    // Exactly one run generated; the rest reused its persisted result.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    assert_eq!(reports.iter().filter(|r| !r.reused).count(), 1);
    assert_eq!(store.question_count(), 1);

    let winner_ids = &reports[0].question_ids;
    for report in &reports {
        assert_eq!(&report.question_ids, winner_ids);
    }
}

#[tokio::test]
async fn test_concurrent_different_uploads_proceed_independently() {
    init_tracing();
    let store = MemoryStore::new();
    for upload_id in ["a1", "a2", "a3"] {
        store.add_upload(upload_id);
        store.add_fragment(ContentFragment::new(upload_id, 0, "Some content."));
    }

    let orchestrator = Arc::new(
        PipelineOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(MockGenerator::new()),
            test_config(),
        )
        .unwrap(),
    );

    let mut handles = Vec::new();
    for upload_id in ["a1", "a2", "a3"] {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .generate_questions(upload_id, &CancellationToken::new())
                .await
        }));
    }

    for joined in futures::future::join_all(handles).await {
        let report = joined.unwrap().unwrap();
        assert_eq!(report.question_count, 1);
        assert!(!report.reused);
    }
    assert_eq!(store.question_count(), 3);
}

#[tokio::test]
async fn test_cancellation_between_steps_leaves_store_untouched() {
    init_tracing();
    let store = seeded_store("u1");
    let token = CancellationToken::new();

    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(CancellingGenerator {
            inner: MockGenerator::new(),
            token: token.clone(),
        }),
        test_config(),
    )
    .unwrap();

    let err = orchestrator
        .generate_questions("u1", &token)
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert_eq!(store.question_count(), 0);
}

#[tokio::test]
async fn test_health_check_passthrough() {
    let store = MemoryStore::new();
    let orchestrator = PipelineOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store),
        Arc::new(MockGenerator::new()),
        test_config(),
    )
    .unwrap();

    assert!(orchestrator.health_check().await.is_ok());
}
