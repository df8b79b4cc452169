use serde::{Deserialize, Serialize};

pub type DocId = u64;
pub type WordId = u64;

/// Placeholder title for pages without a `<title>` element.
pub const NO_TITLE: &str = "No title";

/// Maximum number of hits a ranked search returns.
pub const RESULT_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub url: String,
    pub title: String,
    pub content: String,
    /// RFC 3339 timestamp of the last successful index.
    pub indexed_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub word_id: WordId,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub url: String,
    pub title: String,
    /// Summed term frequency over all query terms.
    pub relevance: u64,
}
