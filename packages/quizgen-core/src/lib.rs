//! Domain layer for the question generation pipeline
//!
//! # Domain Models
//!
//! - `ContentFragment`: Ordered chunk of source text belonging to one upload
//! - `Document`: Ephemeral concatenation of all fragments for one upload
//! - `Question`: Structured multiple-choice record produced by a generator
//!
//! # Pure Logic
//!
//! - `aggregate`: Fragment ordering + concatenation (no I/O)
//! - `question_id`: Deterministic content-hash IDs for idempotent persistence
//!
//! # Error Taxonomy
//!
//! `PipelineError` is the single error type shared by the storage adapters
//! and the orchestrator. Its `ErrorKind` carries the pipeline failure
//! taxonomy (`not_found`, `insufficient_content`, `generation_failed`,
//! `write_conflict`, `store_unavailable`) plus the ambient kinds the
//! state machine and config validation need.

pub mod error;
pub mod fragment;
pub mod question;

pub use error::{ErrorKind, PipelineError, Result};
pub use fragment::{aggregate, ContentFragment, Document};
pub use question::{question_id, Question, QuestionType};
