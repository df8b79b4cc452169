use crate::error::QueryError;
use crate::persist::IndexStore;
use crate::tokenizer::tokenize;
use crate::{SearchHit, RESULT_LIMIT};
use lazy_static::lazy_static;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

lazy_static! {
    static ref SEARCH_FIELD_RE: Regex = Regex::new(r"search=([^&]*)").expect("valid regex");
}

/// Raw (still percent-encoded) value of the first `search=` field in a form body.
pub fn extract_search_field(body: &str) -> Option<&str> {
    SEARCH_FIELD_RE.captures(body).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Percent-decode a form value. Invalid UTF-8 is replaced, never rejected.
pub fn url_decode(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

/// Distinct index terms of a decoded query.
pub fn query_terms(query: &str) -> BTreeSet<String> {
    tokenize(query).into_iter().collect()
}

#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<dyn IndexStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    /// Run a ranked search for an encoded `search` field value.
    pub fn search(&self, raw_query: &str) -> Result<Vec<SearchHit>, QueryError> {
        let terms = query_terms(&url_decode(raw_query));
        if terms.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        tracing::debug!(?terms, "ranked search");
        Ok(self.store.ranked_search(&terms, RESULT_LIMIT)?)
    }
}
