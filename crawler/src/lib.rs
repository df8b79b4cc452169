pub mod fetch;
pub mod job;
pub mod pool;

pub use fetch::{Fetcher, HttpFetcher};
pub use job::{extract_title, CrawlError, CrawlJob, CrawlStats, Crawler};
pub use pool::{CrawlPool, JobRunner, PoolStats};
