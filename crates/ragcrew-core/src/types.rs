//! Domain types shared by the ingestion, index and pipeline crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A source document as read from disk. Never modified after reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub source: String,
    pub text: String,
}

/// A bounded slice of a source document; the unit of embedding and storage.
///
/// - `doc_id`: file stem of the source document
/// - `doc_path`: original path to the source file
/// - `chunk_index`: position within the parent document
/// - `content`: the text payload, never empty
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentChunk {
    pub doc_id: String,
    pub doc_path: String,
    pub chunk_index: usize,
    pub content: String,
}

/// A single nearest-neighbour hit as reported by a vector backend.
///
/// `score` is backend-specific and only used for ordering inside the backend;
/// the core exposes hit text in rank order and nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
    pub text: String,
}

/// Similarity metric used when building the vector index. Parsing is
/// case-insensitive and accepts `ip` for `dot`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Metric {
    #[default]
    Cosine,
    L2,
    Dot,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::L2 => "l2",
            Metric::Dot => "dot",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "l2" => Ok(Metric::L2),
            "dot" | "ip" => Ok(Metric::Dot),
            other => Err(Error::Config(format!("unknown metric '{other}'"))),
        }
    }
}

impl TryFrom<String> for Metric {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
