use crate::fetch::Fetcher;
use crate::pool::JobRunner;
use sift_core::error::{FetchError, StoreError};
use sift_core::link::extract_links;
use sift_core::{Link, NO_TITLE};
use sift_indexer::Indexer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Fetch-and-index work for one link with `depth` further hops allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub link: Link,
    pub depth: u32,
}

impl CrawlJob {
    pub fn new(link: Link, depth: u32) -> Self {
        Self { link, depth }
    }

    /// Job for a link found on this page. Only meaningful when `depth > 0`.
    pub fn child(&self, link: Link) -> CrawlJob {
        CrawlJob { link, depth: self.depth.saturating_sub(1) }
    }
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to index page: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub indexed: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub store_failures: AtomicU64,
    pub links_enqueued: AtomicU64,
}

/// Text between the first `<title>` and the first `</title>`, else the placeholder.
pub fn extract_title(html: &str) -> String {
    const OPEN: &str = "<title>";
    let start = html.find(OPEN).map(|i| i + OPEN.len());
    let end = html.find("</title>");
    match (start, end) {
        (Some(s), Some(e)) if s <= e => html[s..e].to_string(),
        _ => NO_TITLE.to_string(),
    }
}

pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    indexer: Indexer,
    stats: CrawlStats,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>, indexer: Indexer) -> Self {
        Self { fetcher, indexer, stats: CrawlStats::default() }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Fetch, index and expand one job.
    pub fn process(&self, job: &CrawlJob) -> Result<Vec<CrawlJob>, CrawlError> {
        tracing::info!(url = %job.link, depth = job.depth, "processing");

        let html = self.fetcher.fetch(&job.link)?;
        let title = extract_title(&html);
        let url = job.link.to_string();
        self.indexer.index(&url, &title, &html)?;

        if job.depth == 0 {
            return Ok(Vec::new());
        }
        let children: Vec<CrawlJob> = extract_links(&job.link, &html)
            .into_iter()
            .map(|link| job.child(link))
            .collect();
        tracing::debug!(url = %job.link, links = children.len(), "discovered links");
        Ok(children)
    }
}

impl JobRunner for Crawler {
    fn run(&self, job: CrawlJob) -> Vec<CrawlJob> {
        match self.process(&job) {
            Ok(children) => {
                self.stats.indexed.fetch_add(1, Ordering::Relaxed);
                self.stats.links_enqueued.fetch_add(children.len() as u64, Ordering::Relaxed);
                children
            }
            Err(CrawlError::Fetch(e)) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(url = %job.link, error = %e, "failed to get content");
                Vec::new()
            }
            Err(e) => {
                self.stats.store_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(url = %job.link, error = %e, "error processing link");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_extraction() {
        assert_eq!(extract_title("<html><title>Hello</title></html>"), "Hello");
        assert_eq!(extract_title("<title></title>"), "");
        assert_eq!(extract_title("<p>no title here</p>"), NO_TITLE);
        assert_eq!(extract_title("</title> then <title>"), NO_TITLE);
    }

    #[test]
    fn child_decrements_depth() {
        let parent = CrawlJob::new(Link::parse("http://a.test/").unwrap(), 2);
        let child = parent.child(Link::parse("http://a.test/next").unwrap());
        assert_eq!(child.depth, 1);
        assert_eq!(child.link.path, "/next");
    }
}
