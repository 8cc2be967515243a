//! Storage layer for the question generation pipeline
//!
//! # Port Traits
//!
//! - `FragmentStore`: ordered read of content fragments by upload id
//! - `QuestionStore`: idempotent upsert-by-id write, upload existence
//!   check, read-back of persisted questions, store health check
//!
//! # Adapters
//!
//! - `PgStore`: PostgreSQL via sqlx connection pool. Parameterized queries
//!   only; no SQL leaks into the pipeline core.
//! - `MemoryStore`: in-process adapter for tests and examples.
//!
//! # Error Mapping
//!
//! Store failures map onto the shared `PipelineError` taxonomy:
//! connectivity and query failures become `StoreUnavailable` (retryable at
//! the orchestrator's discretion), foreign-key violations on persist become
//! `WriteConflict` (never retried), an upload with zero fragments becomes
//! `NotFound`.

pub mod domain;
pub mod infrastructure;

pub use domain::{FragmentStore, QuestionStore};
pub use infrastructure::memory::MemoryStore;
pub use infrastructure::postgres::PgStore;
