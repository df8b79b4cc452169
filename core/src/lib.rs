pub mod config;
pub mod error;
pub mod index;
pub mod link;
pub mod persist;
pub mod query;
pub mod tokenizer;

pub use index::{DocId, Document, Posting, SearchHit, WordId, NO_TITLE, RESULT_LIMIT};
pub use link::{Link, Protocol};
