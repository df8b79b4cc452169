//! Turns a fetched page into document, word and posting records.
//!
//! Every page is written in one store transaction: the document upsert, the
//! removal of its previous postings and the new word/posting upserts commit
//! together or not at all.

use sift_core::error::StoreError;
use sift_core::persist::IndexStore;
use sift_core::tokenizer::{term_frequencies, tokenize_document};
use sift_core::DocId;
use std::cell::Cell;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Clone)]
pub struct Indexer {
    store: Arc<dyn IndexStore>,
}

impl Indexer {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Index one page, replacing whatever was stored for `url` before.
    pub fn index(&self, url: &str, title: &str, raw_content: &str) -> Result<DocId, StoreError> {
        let counts = term_frequencies(tokenize_document(raw_content));
        let indexed_at = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();

        let doc_id = Cell::new(0);
        self.store.write(&|w| {
            let doc = w.upsert_document(url, title, raw_content, &indexed_at)?;
            w.clear_postings(doc)?;
            for (term, count) in &counts {
                let word = w.upsert_word(term)?;
                w.upsert_posting(doc, word, *count)?;
            }
            doc_id.set(doc);
            Ok(())
        })?;

        tracing::debug!(url, doc_id = doc_id.get(), terms = counts.len(), "indexed document");
        Ok(doc_id.get())
    }
}
