//! Question generation pipeline orchestration
//!
//! Turns the ordered text fragments of an upload into persisted
//! multiple-choice questions:
//!
//! ```text
//! Fetching → Aggregating → Generating → Persisting → Done
//! ```
//!
//! Architecture:
//! - Run State Machine (`run`): guarded step transitions, terminal
//!   Failed/Cancelled states
//! - Generator Strategies (`generator`): pluggable, mock + extractive
//! - Orchestrator (`orchestrator`): sequencing, per-upload serialization,
//!   bounded retry with exponential backoff, cancellation at step
//!   boundaries
//! - Configuration (`config`): retry policy and generator knobs
//!
//! Side effects are confined to the fetching (read) and persisting
//! (write) steps; aggregation and generation are pure. Persistence is
//! idempotent and transactional, so a retried or raced run never leaves a
//! partial question set.

pub mod config;
pub mod generator;
pub mod orchestrator;
pub mod run;

pub use config::{PipelineConfig, RetryPolicy};
pub use generator::{ExtractiveGenerator, GeneratorConfig, MockGenerator, QuestionGenerator};
pub use orchestrator::{PipelineOrchestrator, RunReport};
pub use run::{PipelineRun, RunState, Step};
