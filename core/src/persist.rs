use crate::error::StoreError;
use crate::tokenizer::is_indexable_len;
use crate::{DocId, Document, Posting, SearchHit, WordId};
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::{Db, Transactional, Tree};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Writes issued inside one store transaction.
pub trait IndexWriter {
    /// Insert or overwrite the document keyed by `url`, returning its id.
    fn upsert_document(&mut self, url: &str, title: &str, content: &str, indexed_at: &str) -> Result<DocId, StoreError>;
    /// Return the id of `term`, creating it on first sight.
    fn upsert_word(&mut self, term: &str) -> Result<WordId, StoreError>;
    /// Set the count of `word` in `doc`, replacing any previous count.
    fn upsert_posting(&mut self, doc: DocId, word: WordId, count: u32) -> Result<(), StoreError>;
    /// Drop every posting currently recorded for `doc`.
    fn clear_postings(&mut self, doc: DocId) -> Result<(), StoreError>;
}

pub type WriteFn<'a> = dyn Fn(&mut dyn IndexWriter) -> Result<(), StoreError> + 'a;

/// Durable inverted index shared by crawler workers and query connections.
pub trait IndexStore: Send + Sync {
    /// Run `f` atomically: all of its writes commit, or none do. `f` may be re-run on conflict.
    fn write(&self, f: &WriteFn<'_>) -> Result<(), StoreError>;

    /// Documents containing every term of `terms`, by summed count, best first.
    fn ranked_search(&self, terms: &BTreeSet<String>, limit: usize) -> Result<Vec<SearchHit>, StoreError>;

    fn document(&self, id: DocId) -> Result<Option<Document>, StoreError>;

    fn document_id(&self, url: &str) -> Result<Option<DocId>, StoreError>;

    fn document_count(&self) -> usize;
}

/// sled-backed [`IndexStore`].
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    documents: Tree,
    document_urls: Tree,
    words: Tree,
    postings: Tree,
    document_words: Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database removed on drop.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        Ok(Self {
            documents: db.open_tree("documents")?,
            document_urls: db.open_tree("document_urls")?,
            words: db.open_tree("words")?,
            postings: db.open_tree("postings")?,
            document_words: db.open_tree("document_words")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn word_id(&self, term: &str) -> Result<Option<WordId>, StoreError> {
        self.words.get(term.as_bytes())?.map(|v| decode_id(&v)).transpose()
    }

    pub fn postings_for_word(&self, word: WordId) -> Result<Vec<Posting>, StoreError> {
        let mut out = Vec::new();
        for entry in self.postings.scan_prefix(word.to_be_bytes()) {
            let (key, value) = entry?;
            let (word_id, doc_id) = decode_posting_key(&key)?;
            out.push(Posting { doc_id, word_id, count: decode_count(&value)? });
        }
        Ok(out)
    }
}

impl IndexStore for SledStore {
    fn write(&self, f: &WriteFn<'_>) -> Result<(), StoreError> {
        let trees = (&self.documents, &self.document_urls, &self.words, &self.postings, &self.document_words);
        let result = trees.transaction(|(documents, document_urls, words, postings, document_words)| {
            let mut writer = SledWriter {
                documents,
                document_urls,
                words,
                postings,
                document_words,
                touched: BTreeMap::new(),
            };
            let outcome = f(&mut writer).and_then(|()| writer.finish());
            match outcome {
                Ok(()) => Ok(()),
                Err(StoreError::Interrupted(e)) => Err(e.into()),
                Err(e) => Err(ConflictableTransactionError::Abort(e)),
            }
        });
        match result {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn ranked_search(&self, terms: &BTreeSet<String>, limit: usize) -> Result<Vec<SearchHit>, StoreError> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut word_ids = Vec::with_capacity(terms.len());
        for term in terms {
            match self.word_id(term)? {
                Some(id) => word_ids.push(id),
                // no document can contain every term
                None => return Ok(Vec::new()),
            }
        }

        // doc -> (relevance, distinct terms matched)
        let mut scores: HashMap<DocId, (u64, usize)> = HashMap::new();
        for word in &word_ids {
            for p in self.postings_for_word(*word)? {
                let e = scores.entry(p.doc_id).or_insert((0, 0));
                e.0 += u64::from(p.count);
                e.1 += 1;
            }
        }

        let mut scored: Vec<(DocId, u64)> = scores
            .into_iter()
            .filter(|(_, (_, matched))| *matched == word_ids.len())
            .map(|(doc, (relevance, _))| (doc, relevance))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);

        let mut hits = Vec::with_capacity(scored.len());
        for (doc_id, relevance) in scored {
            let doc = self
                .document(doc_id)?
                .ok_or_else(|| StoreError::Corrupt(format!("posting references missing document {doc_id}")))?;
            hits.push(SearchHit { doc_id, url: doc.url, title: doc.title, relevance });
        }
        Ok(hits)
    }

    fn document(&self, id: DocId) -> Result<Option<Document>, StoreError> {
        match self.documents.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn document_id(&self, url: &str) -> Result<Option<DocId>, StoreError> {
        self.document_urls.get(url.as_bytes())?.map(|v| decode_id(&v)).transpose()
    }

    fn document_count(&self) -> usize {
        self.documents.len()
    }
}

struct SledWriter<'t> {
    documents: &'t TransactionalTree,
    document_urls: &'t TransactionalTree,
    words: &'t TransactionalTree,
    postings: &'t TransactionalTree,
    document_words: &'t TransactionalTree,
    /// Word lists of documents written in this transaction, persisted by `finish`.
    touched: BTreeMap<DocId, BTreeSet<WordId>>,
}

impl SledWriter<'_> {
    fn load_words(&self, doc: DocId) -> Result<BTreeSet<WordId>, StoreError> {
        match self.document_words.get(doc.to_be_bytes())? {
            Some(bytes) => Ok(bincode::deserialize(&bytes)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn finish(&self) -> Result<(), StoreError> {
        for (doc, words) in &self.touched {
            let bytes = bincode::serialize(words)?;
            self.document_words.insert(&doc.to_be_bytes()[..], bytes)?;
        }
        Ok(())
    }
}

impl IndexWriter for SledWriter<'_> {
    fn upsert_document(&mut self, url: &str, title: &str, content: &str, indexed_at: &str) -> Result<DocId, StoreError> {
        let id = match self.document_urls.get(url.as_bytes())? {
            Some(v) => decode_id(&v)?,
            None => {
                let id = self.documents.generate_id()?;
                self.document_urls.insert(url.as_bytes(), &id.to_be_bytes()[..])?;
                id
            }
        };
        let doc = Document {
            url: url.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            indexed_at: indexed_at.to_string(),
        };
        self.documents.insert(&id.to_be_bytes()[..], bincode::serialize(&doc)?)?;
        Ok(id)
    }

    fn upsert_word(&mut self, term: &str) -> Result<WordId, StoreError> {
        if !is_indexable_len(term) {
            return Err(StoreError::InvalidWord(term.to_string()));
        }
        if let Some(v) = self.words.get(term.as_bytes())? {
            return decode_id(&v);
        }
        let id = self.words.generate_id()?;
        self.words.insert(term.as_bytes(), &id.to_be_bytes()[..])?;
        Ok(id)
    }

    fn upsert_posting(&mut self, doc: DocId, word: WordId, count: u32) -> Result<(), StoreError> {
        if count == 0 {
            return Err(StoreError::ZeroCount { doc, word });
        }
        if !self.touched.contains_key(&doc) {
            let existing = self.load_words(doc)?;
            self.touched.insert(doc, existing);
        }
        if let Some(words) = self.touched.get_mut(&doc) {
            words.insert(word);
        }
        self.postings.insert(&posting_key(word, doc)[..], &count.to_be_bytes()[..])?;
        Ok(())
    }

    fn clear_postings(&mut self, doc: DocId) -> Result<(), StoreError> {
        let existing = match self.touched.remove(&doc) {
            Some(words) => words,
            None => self.load_words(doc)?,
        };
        for word in existing {
            self.postings.remove(&posting_key(word, doc)[..])?;
        }
        self.touched.insert(doc, BTreeSet::new());
        Ok(())
    }
}

fn posting_key(word: WordId, doc: DocId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&word.to_be_bytes());
    key[8..].copy_from_slice(&doc.to_be_bytes());
    key
}

fn decode_posting_key(key: &[u8]) -> Result<(WordId, DocId), StoreError> {
    if key.len() != 16 {
        return Err(StoreError::Corrupt(format!("posting key of {} bytes", key.len())));
    }
    Ok((decode_id(&key[..8])?, decode_id(&key[8..])?))
}

fn decode_id(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(arr))
}

fn decode_count(bytes: &[u8]) -> Result<u32, StoreError> {
    let arr: [u8; 4] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("count of {} bytes", bytes.len())))?;
    Ok(u32::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(store: &SledStore, url: &str, counts: &[(&str, u32)]) -> DocId {
        store
            .write(&|w| {
                let doc = w.upsert_document(url, "t", "c", "2024-01-01T00:00:00Z")?;
                w.clear_postings(doc)?;
                for (term, count) in counts {
                    let word = w.upsert_word(term)?;
                    w.upsert_posting(doc, word, *count)?;
                }
                Ok(())
            })
            .unwrap();
        store.document_id(url).unwrap().unwrap()
    }

    fn terms(ts: &[&str]) -> BTreeSet<String> {
        ts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn document_upsert_keeps_identity() {
        let store = SledStore::temporary().unwrap();
        let a = put(&store, "http://a/", &[("cat", 1)]);
        let b = put(&store, "http://a/", &[("dog", 1)]);
        assert_eq!(a, b);
        assert_eq!(store.document_count(), 1);
    }

    #[test]
    fn word_upsert_is_idempotent() {
        let store = SledStore::temporary().unwrap();
        put(&store, "http://a/", &[("cat", 1)]);
        let first = store.word_id("cat").unwrap();
        put(&store, "http://b/", &[("cat", 4)]);
        assert_eq!(store.word_id("cat").unwrap(), first);
    }

    #[test]
    fn ranked_search_requires_every_term() {
        let store = SledStore::temporary().unwrap();
        let d1 = put(&store, "http://d1/", &[("cat", 2), ("dog", 1)]);
        put(&store, "http://d2/", &[("cat", 3)]);
        let hits = store.ranked_search(&terms(&["cat", "dog"]), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, d1);
        assert_eq!(hits[0].relevance, 3);
    }

    #[test]
    fn unknown_term_matches_nothing() {
        let store = SledStore::temporary().unwrap();
        put(&store, "http://d1/", &[("cat", 2)]);
        assert!(store.ranked_search(&terms(&["cat", "zebra"]), 10).unwrap().is_empty());
    }

    #[test]
    fn failed_write_rolls_back_whole_document() {
        let store = SledStore::temporary().unwrap();
        let err = store.write(&|w| {
            let doc = w.upsert_document("http://a/", "t", "c", "now")?;
            let word = w.upsert_word("cat")?;
            w.upsert_posting(doc, word, 1)?;
            w.upsert_word("no")?;
            Ok(())
        });
        assert!(matches!(err, Err(StoreError::InvalidWord(_))));
        assert_eq!(store.document_count(), 0);
        assert!(store.word_id("cat").unwrap().is_none());
    }

    #[test]
    fn zero_count_is_rejected() {
        let store = SledStore::temporary().unwrap();
        let err = store.write(&|w| {
            let doc = w.upsert_document("http://a/", "t", "c", "now")?;
            let word = w.upsert_word("cat")?;
            w.upsert_posting(doc, word, 0)
        });
        assert!(matches!(err, Err(StoreError::ZeroCount { .. })));
    }

    #[test]
    fn clear_postings_drops_stale_terms() {
        let store = SledStore::temporary().unwrap();
        let doc = put(&store, "http://a/", &[("cat", 2)]);
        put(&store, "http://a/", &[("bird", 1)]);
        let cat = store.word_id("cat").unwrap().unwrap();
        assert!(store.postings_for_word(cat).unwrap().is_empty());
        let bird = store.word_id("bird").unwrap().unwrap();
        assert_eq!(
            store.postings_for_word(bird).unwrap(),
            vec![Posting { doc_id: doc, word_id: bird, count: 1 }]
        );
    }
}
