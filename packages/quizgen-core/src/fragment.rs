//! Content fragments and document aggregation
//!
//! A fragment is an ordered chunk of source text belonging to one upload.
//! Fragments are immutable once stored; the ingestion process that writes
//! them is external to this pipeline.
//!
//! `aggregate` is the pure step of the pipeline: it assembles the full
//! document for one upload without touching any store.

use serde::{Deserialize, Serialize};

/// Separator inserted between fragment texts during aggregation.
pub const FRAGMENT_SEPARATOR: &str = "\n";

/// Ordered chunk of source text within an upload
///
/// # Identity
///
/// `order_index` is unique per upload and defines the sequence in which
/// fragments are concatenated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFragment {
    /// Upload this fragment belongs to
    pub upload_id: String,
    /// Position within the upload (ascending)
    pub order_index: i32,
    /// Fragment text
    pub text: String,
}

impl ContentFragment {
    pub fn new(upload_id: impl Into<String>, order_index: i32, text: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            order_index,
            text: text.into(),
        }
    }
}

/// Full concatenated text for one upload, assembled for generation
///
/// Ephemeral: a document lives only for the duration of a pipeline run and
/// is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Upload the document was assembled for
    pub upload_id: String,
    /// Concatenated fragment text
    pub text: String,
}

impl Document {
    pub fn new(upload_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            upload_id: upload_id.into(),
            text: text.into(),
        }
    }

    /// True when the document contains no usable content.
    ///
    /// The orchestrator maps blank documents to `InsufficientContent`.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Concatenate fragments into one document, ordered by `order_index`
/// ascending, with a single separator between fragments.
///
/// Pure function: no truncation, no store access. Empty input yields an
/// empty document; the caller decides whether that is an error.
///
/// Fragments are sorted defensively before joining, so callers that fetch
/// through a store which already orders them pay only a no-op pass.
pub fn aggregate(upload_id: impl Into<String>, fragments: &[ContentFragment]) -> Document {
    let mut ordered: Vec<&ContentFragment> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.order_index);

    let text = ordered
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(FRAGMENT_SEPARATOR);

    Document::new(upload_id, text)
}
