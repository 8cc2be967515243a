//! Question model and deterministic ID generation

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Question type
///
/// Round-trips through the snake_case strings used as the database
/// representation (`question_type` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::TrueFalse => "true_false",
            QuestionType::ShortAnswer => "short_answer",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "multiple_choice" => Ok(QuestionType::MultipleChoice),
            "true_false" => Ok(QuestionType::TrueFalse),
            "short_answer" => Ok(QuestionType::ShortAnswer),
            _ => Err(PipelineError::parse(format!(
                "invalid question type: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured question record produced by a generator
///
/// Created by a `QuestionGenerator`, owned by the `QuestionStore` until
/// persisted; thereafter owned by storage.
///
/// # Invariants
///
/// - `options` is non-empty
/// - `correct_index` is a valid index into `options`
/// - `upload_id` references an existing upload (enforced at persist time)
/// - `id` is globally unique (deterministic content hash, see [`question_id`])
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Globally unique question ID
    pub id: String,
    /// Upload the question was generated from
    pub upload_id: String,
    /// Question stem
    pub question_text: String,
    /// Question type
    pub question_type: QuestionType,
    /// Answer options, ordered
    pub options: Vec<String>,
    /// 0-based index of the correct option
    pub correct_index: usize,
    /// Optional explanation of the correct answer
    pub answer_explanation: Option<String>,
}

impl Question {
    /// Check the data-model invariants.
    ///
    /// Generators call this before returning; a violation means the
    /// strategy could not produce a valid question.
    pub fn validate(&self) -> Result<()> {
        if self.options.is_empty() {
            return Err(PipelineError::generation_failed(
                &self.upload_id,
                format!("question {} has no options", self.id),
            ));
        }
        if self.correct_index >= self.options.len() {
            return Err(PipelineError::generation_failed(
                &self.upload_id,
                format!(
                    "question {} correct_index {} out of range [0, {})",
                    self.id,
                    self.correct_index,
                    self.options.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Generate a deterministic question ID from its identifying content.
///
/// Format: 32 hex chars of a double std hash over
/// `upload_id:question_index:question_text`. A retried run regenerates
/// identical IDs, so the upsert-by-id write collapses duplicates without
/// caller cooperation.
pub fn question_id(upload_id: &str, question_index: usize, question_text: &str) -> String {
    let input = format!("{}:{}:{}", upload_id, question_index, question_text);
    hash_to_hex(&input)
}

/// Hash an input to a 32-char hex string.
fn hash_to_hex(input: &str) -> String {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    let hash1 = hasher.finish();

    // Hash again for more bits
    let mut hasher2 = DefaultHasher::new();
    format!("{}:{}", input, hash1).hash(&mut hasher2);
    let hash2 = hasher2.finish();

    format!("{:016x}{:016x}", hash1, hash2)
}
