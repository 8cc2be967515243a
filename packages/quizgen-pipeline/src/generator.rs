//! Question generator strategies (pluggable)
//!
//! `QuestionGenerator` is the deliberately pluggable seam of the pipeline:
//! anything that can turn a `Document` into valid `Question`s plugs in
//! here. Two strategies ship with the crate:
//!
//! - `MockGenerator`: fixed single question, useful for wiring tests and
//!   end-to-end smoke runs
//! - `ExtractiveGenerator`: heuristic cloze questions extracted from the
//!   document's own sentences, no model dependency
//!
//! Every strategy guarantees that returned questions pass
//! `Question::validate` and carry the document's upload id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quizgen_core::{question_id, Document, PipelineError, Question, QuestionType, Result};

/// Generator tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Upper bound on questions per document
    pub max_questions: usize,
    /// Sentences shorter than this (in chars) are not worth asking about
    pub min_sentence_chars: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_questions: 5,
            min_sentence_chars: 12,
        }
    }
}

/// Pluggable question generation strategy
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    /// Strategy identifier (for logs)
    fn name(&self) -> &'static str;

    /// Produce at least one valid question from a non-empty document.
    ///
    /// Fails with `GenerationFailed` if the strategy cannot produce a
    /// valid question for this document.
    async fn generate(&self, document: &Document, config: &GeneratorConfig)
        -> Result<Vec<Question>>;
}

/// Fixed-output strategy
///
/// Emits a single canned multiple-choice question regardless of document
/// content. Keeps wiring tests and smoke-run fixtures stable.
#[derive(Debug, Clone, Default)]
pub struct MockGenerator;

impl MockGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QuestionGenerator for MockGenerator {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(
        &self,
        document: &Document,
        _config: &GeneratorConfig,
    ) -> Result<Vec<Question>> {
        let question_text = "What is the main topic?";

        let question = Question {
            id: question_id(&document.upload_id, 0, question_text),
            upload_id: document.upload_id.clone(),
            question_text: question_text.to_string(),
            question_type: QuestionType::MultipleChoice,
            options: vec![
                "Option A".to_string(),
                "Option B".to_string(),
                "Option C".to_string(),
                "Option D".to_string(),
            ],
            correct_index: 2,
            answer_explanation: Some("C is correct because ...".to_string()),
        };

        question.validate()?;
        Ok(vec![question])
    }
}

/// Heuristic extractive strategy
///
/// Splits the document into sentences, blanks out the longest word of each
/// usable sentence and asks for it back, with distractors drawn from the
/// other sentences. Deterministic: the same document always yields the
/// same questions (and therefore the same question ids).
#[derive(Debug, Clone, Default)]
pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub fn new() -> Self {
        Self
    }
}

/// Minimum length for a word to be blanked out.
const MIN_BLANK_WORD_CHARS: usize = 4;

/// Fallback distractors when the document has too few sentences to draw
/// from.
const FALLBACK_DISTRACTORS: &[&str] = &["context", "fragment", "document"];

fn split_sentences(text: &str) -> Vec<&str> {
    text.split_terminator(['.', '?', '!'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Longest alphanumeric word of a sentence, punctuation stripped.
fn longest_word(sentence: &str) -> Option<&str> {
    sentence
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= MIN_BLANK_WORD_CHARS)
        .max_by_key(|w| w.chars().count())
}

#[async_trait]
impl QuestionGenerator for ExtractiveGenerator {
    fn name(&self) -> &'static str {
        "extractive"
    }

    async fn generate(
        &self,
        document: &Document,
        config: &GeneratorConfig,
    ) -> Result<Vec<Question>> {
        let sentences: Vec<&str> = split_sentences(&document.text)
            .into_iter()
            .filter(|s| s.chars().count() >= config.min_sentence_chars)
            .collect();

        // Blankable word per usable sentence; sentences without one are
        // skipped but still serve as distractor sources.
        let keywords: Vec<Option<&str>> = sentences.iter().map(|s| longest_word(s)).collect();

        let mut questions = Vec::new();

        for (i, sentence) in sentences.iter().enumerate() {
            if questions.len() >= config.max_questions {
                break;
            }
            let Some(word) = keywords[i] else {
                continue;
            };

            let question_text = format!(
                "Fill in the blank: {}",
                sentence.replacen(word, "____", 1)
            );

            // Distractors: keywords of other sentences, deduplicated,
            // topped up from the fallback list.
            let mut distractors: Vec<String> = Vec::new();
            for (j, keyword) in keywords.iter().enumerate() {
                if distractors.len() >= 3 {
                    break;
                }
                if j == i {
                    continue;
                }
                if let Some(k) = keyword {
                    if !k.eq_ignore_ascii_case(word) && !distractors.iter().any(|d| d == k) {
                        distractors.push((*k).to_string());
                    }
                }
            }
            for fallback in FALLBACK_DISTRACTORS {
                if distractors.len() >= 3 {
                    break;
                }
                if !fallback.eq_ignore_ascii_case(word) && !distractors.iter().any(|d| d == fallback)
                {
                    distractors.push((*fallback).to_string());
                }
            }

            let correct_index = i % (distractors.len() + 1);
            let mut options = distractors;
            options.insert(correct_index, word.to_string());

            let question = Question {
                id: question_id(&document.upload_id, i, &question_text),
                upload_id: document.upload_id.clone(),
                question_text,
                question_type: QuestionType::MultipleChoice,
                options,
                correct_index,
                answer_explanation: Some(format!("The source text states: \"{}\"", sentence)),
            };

            question.validate()?;
            questions.push(question);
        }

        if questions.is_empty() {
            return Err(PipelineError::generation_failed(
                &document.upload_id,
                "no extractable sentences in document",
            ));
        }

        Ok(questions)
    }
}
