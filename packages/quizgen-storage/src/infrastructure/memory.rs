//! In-memory storage adapter
//!
//! Same trait surface and error mapping as `PgStore`, backed by a mutex.
//! Used by tests and examples; seeding goes through `add_upload` /
//! `add_fragment`.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use quizgen_core::{ContentFragment, PipelineError, Question, Result};

use crate::domain::{FragmentStore, QuestionStore};

#[derive(Default)]
struct Inner {
    uploads: HashSet<String>,
    fragments: Vec<ContentFragment>,
    questions: Vec<Question>,
}

/// In-process fragment and question store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an upload id so fragment and question writes resolve.
    pub fn add_upload(&self, upload_id: impl Into<String>) {
        self.inner.lock().uploads.insert(upload_id.into());
    }

    pub fn add_fragment(&self, fragment: ContentFragment) {
        self.inner.lock().fragments.push(fragment);
    }

    pub fn add_fragments(&self, fragments: impl IntoIterator<Item = ContentFragment>) {
        self.inner.lock().fragments.extend(fragments);
    }

    /// Number of stored question rows (duplicates would show up here).
    pub fn question_count(&self) -> usize {
        self.inner.lock().questions.len()
    }
}

#[async_trait]
impl FragmentStore for MemoryStore {
    async fn fetch_fragments(&self, upload_id: &str) -> Result<Vec<ContentFragment>> {
        let inner = self.inner.lock();

        let mut fragments: Vec<ContentFragment> = inner
            .fragments
            .iter()
            .filter(|f| f.upload_id == upload_id)
            .cloned()
            .collect();

        if fragments.is_empty() {
            return Err(PipelineError::not_found(upload_id));
        }

        fragments.sort_by_key(|f| f.order_index);
        Ok(fragments)
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn upload_exists(&self, upload_id: &str) -> Result<bool> {
        Ok(self.inner.lock().uploads.contains(upload_id))
    }

    async fn persist_questions(&self, questions: &[Question]) -> Result<usize> {
        if questions.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.lock();

        // All-or-nothing: reject the whole batch before touching state,
        // mirroring the transactional adapter.
        for question in questions {
            if !inner.uploads.contains(&question.upload_id) {
                return Err(PipelineError::write_conflict(
                    &question.upload_id,
                    format!(
                        "question references non-existent upload: {}",
                        question.upload_id
                    ),
                ));
            }
        }

        for question in questions {
            // Upsert-by-id: drop any existing row with the same id first.
            inner.questions.retain(|q| q.id != question.id);
            inner.questions.push(question.clone());
        }

        Ok(questions.len())
    }

    async fn questions_for_upload(&self, upload_id: &str) -> Result<Vec<Question>> {
        let inner = self.inner.lock();

        let mut questions: Vec<Question> = inner
            .questions
            .iter()
            .filter(|q| q.upload_id == upload_id)
            .cloned()
            .collect();

        questions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(questions)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizgen_core::{question_id, ErrorKind, QuestionType};

    fn question(upload_id: &str, index: usize, stem: &str) -> Question {
        Question {
            id: question_id(upload_id, index, stem),
            upload_id: upload_id.to_string(),
            question_text: stem.to_string(),
            question_type: QuestionType::MultipleChoice,
            options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
            correct_index: 2,
            answer_explanation: None,
        }
    }

    #[tokio::test]
    async fn test_fetch_fragments_ordered() {
        let store = MemoryStore::new();
        store.add_upload("u1");
        store.add_fragments([
            ContentFragment::new("u1", 1, "Part B."),
            ContentFragment::new("u1", 0, "Part A."),
        ]);

        let fragments = store.fetch_fragments("u1").await.unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "Part A.");
        assert_eq!(fragments[1].text, "Part B.");
    }

    #[tokio::test]
    async fn test_fetch_fragments_empty_upload_is_not_found() {
        let store = MemoryStore::new();
        store.add_upload("u2");

        let err = store.fetch_fragments("u2").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(err.upload_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn test_persist_twice_is_idempotent() {
        let store = MemoryStore::new();
        store.add_upload("u1");

        let q = question("u1", 0, "What is the main topic?");

        let first = store.persist_questions(&[q.clone()]).await.unwrap();
        let second = store.persist_questions(&[q]).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(store.question_count(), 1);
    }

    #[tokio::test]
    async fn test_persist_unknown_upload_is_write_conflict() {
        let store = MemoryStore::new();

        let q = question("ghost", 0, "Who wrote this?");
        let err = store.persist_questions(&[q]).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::WriteConflict);
        assert_eq!(err.upload_id.as_deref(), Some("ghost"));
    }

    #[tokio::test]
    async fn test_persist_batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.add_upload("u1");

        let good = question("u1", 0, "Valid question?");
        let bad = question("ghost", 0, "Dangling question?");

        let err = store.persist_questions(&[good, bad]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::WriteConflict);
        assert_eq!(store.question_count(), 0);
    }

    #[tokio::test]
    async fn test_questions_for_upload_filters_by_upload() {
        let store = MemoryStore::new();
        store.add_upload("u1");
        store.add_upload("u2");

        store
            .persist_questions(&[question("u1", 0, "First?"), question("u1", 1, "Second?")])
            .await
            .unwrap();
        store
            .persist_questions(&[question("u2", 0, "Other?")])
            .await
            .unwrap();

        let u1 = store.questions_for_upload("u1").await.unwrap();
        assert_eq!(u1.len(), 2);
        assert!(u1.iter().all(|q| q.upload_id == "u1"));
    }

    #[tokio::test]
    async fn test_upload_exists() {
        let store = MemoryStore::new();
        store.add_upload("u1");

        assert!(store.upload_exists("u1").await.unwrap());
        assert!(!store.upload_exists("u2").await.unwrap());
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = MemoryStore::new();
        assert!(store.health_check().await.is_ok());
    }
}
