//! Pipeline run state machine
//!
//! A run walks `Fetching → Aggregating → Generating → Persisting → Done`,
//! with terminal `Failed` and `Cancelled` states reachable from any
//! non-terminal step. Forward transitions are guarded: skipping a step is
//! a programming error surfaced as `InvalidTransition`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use quizgen_core::{ErrorKind, PipelineError, Result};

/// Pipeline step identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Fetching,
    Aggregating,
    Generating,
    Persisting,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Fetching => "fetching",
            Step::Aggregating => "aggregating",
            Step::Generating => "generating",
            Step::Persisting => "persisting",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunState {
    Fetching {
        started_at: DateTime<Utc>,
    },
    Aggregating {
        fragment_count: usize,
    },
    Generating {
        document_chars: usize,
    },
    Persisting {
        question_count: usize,
        attempt: u32,
    },
    Done {
        completed_at: DateTime<Utc>,
        duration_ms: u64,
        question_count: usize,
        question_ids: Vec<String>,
    },
    Failed {
        failed_at: DateTime<Utc>,
        step: Step,
        error_kind: ErrorKind,
        error: String,
    },
    Cancelled {
        cancelled_at: DateTime<Utc>,
        step: Step,
    },
}

impl RunState {
    pub fn state_name(&self) -> &'static str {
        match self {
            RunState::Fetching { .. } => "fetching",
            RunState::Aggregating { .. } => "aggregating",
            RunState::Generating { .. } => "generating",
            RunState::Persisting { .. } => "persisting",
            RunState::Done { .. } => "done",
            RunState::Failed { .. } => "failed",
            RunState::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Done { .. } | RunState::Failed { .. } | RunState::Cancelled { .. }
        )
    }
}

/// One pipeline run for one upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    pub upload_id: String,
    pub state: RunState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn new(upload_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            upload_id: upload_id.into(),
            state: RunState::Fetching { started_at: now },
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, state: RunState) {
        self.state = state;
        self.updated_at = Utc::now();
    }

    /// Transition: Fetching → Aggregating
    pub fn begin_aggregating(&mut self, fragment_count: usize) -> Result<()> {
        match self.state {
            RunState::Fetching { .. } => {
                self.transition(RunState::Aggregating { fragment_count });
                Ok(())
            }
            _ => Err(PipelineError::invalid_transition(
                self.state.state_name(),
                "aggregating",
            )),
        }
    }

    /// Transition: Aggregating → Generating
    pub fn begin_generating(&mut self, document_chars: usize) -> Result<()> {
        match self.state {
            RunState::Aggregating { .. } => {
                self.transition(RunState::Generating { document_chars });
                Ok(())
            }
            _ => Err(PipelineError::invalid_transition(
                self.state.state_name(),
                "generating",
            )),
        }
    }

    /// Transition: Generating → Persisting
    pub fn begin_persisting(&mut self, question_count: usize) -> Result<()> {
        match self.state {
            RunState::Generating { .. } => {
                self.transition(RunState::Persisting {
                    question_count,
                    attempt: 0,
                });
                Ok(())
            }
            _ => Err(PipelineError::invalid_transition(
                self.state.state_name(),
                "persisting",
            )),
        }
    }

    /// Record a persistence retry (stays in Persisting).
    pub fn record_persist_attempt(&mut self, next_attempt: u32) -> Result<()> {
        match self.state {
            RunState::Persisting { question_count, .. } => {
                self.transition(RunState::Persisting {
                    question_count,
                    attempt: next_attempt,
                });
                Ok(())
            }
            _ => Err(PipelineError::invalid_transition(
                self.state.state_name(),
                "persisting (retry)",
            )),
        }
    }

    /// Transition: Persisting → Done
    pub fn complete(&mut self, question_ids: Vec<String>) -> Result<()> {
        match self.state {
            RunState::Persisting { .. } => {
                let now = Utc::now();
                let duration_ms = (now - self.created_at).num_milliseconds().max(0) as u64;
                self.transition(RunState::Done {
                    completed_at: now,
                    duration_ms,
                    question_count: question_ids.len(),
                    question_ids,
                });
                Ok(())
            }
            _ => Err(PipelineError::invalid_transition(
                self.state.state_name(),
                "done",
            )),
        }
    }

    /// Transition: any non-terminal → Failed.
    ///
    /// Infallible bookkeeping: failing an already-terminal run is a no-op,
    /// so error paths never mask the original error with a transition
    /// error.
    pub fn fail(&mut self, step: Step, error: &PipelineError) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(RunState::Failed {
            failed_at: Utc::now(),
            step,
            error_kind: error.kind,
            error: error.to_string(),
        });
    }

    /// Transition: any non-terminal → Cancelled. No-op when terminal.
    pub fn cancel(&mut self, step: Step) {
        if self.state.is_terminal() {
            return;
        }
        self.transition(RunState::Cancelled {
            cancelled_at: Utc::now(),
            step,
        });
    }
}
