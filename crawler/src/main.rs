use anyhow::{Context, Result};
use clap::Parser;
use sift_core::config::Config;
use sift_core::persist::{IndexStore, SledStore};
use sift_crawler::{CrawlJob, CrawlPool, Crawler, HttpFetcher};
use sift_indexer::Indexer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "crawler")]
#[command(about = "Crawl from a seed url and index every page into the store")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,
    /// Seed url, overrides [spider] start_url
    #[arg(long)]
    start_url: Option<String>,
    /// Link hops to follow from the seed, overrides [spider] max_depth
    #[arg(long)]
    max_depth: Option<u32>,
    /// Worker threads, overrides [spider] num_threads
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.start_url {
        config.spider.start_url = url;
    }
    if let Some(depth) = cli.max_depth {
        config.spider.max_depth = depth;
    }
    if let Some(threads) = cli.threads {
        config.spider.num_threads = threads.max(1);
    }
    let spider = &config.spider;
    let seed = spider.start_link()?;

    let store = Arc::new(
        SledStore::open(&config.store.path)
            .with_context(|| format!("failed to open store at {}", config.store.path.display()))?,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let fetcher = HttpFetcher::new(
        &spider.user_agent,
        Duration::from_secs(spider.fetch_timeout_secs),
        runtime.handle().clone(),
    )?;
    let crawler = Arc::new(Crawler::new(Arc::new(fetcher), Indexer::new(store.clone())));

    tracing::info!(
        seed = %seed,
        max_depth = spider.max_depth,
        threads = spider.num_threads,
        budget_secs = spider.crawl_secs,
        "starting crawl"
    );
    let pool = CrawlPool::start(spider.num_threads, crawler.clone())?;
    pool.submit(CrawlJob::new(seed, spider.max_depth));

    if !pool.wait_idle(Duration::from_secs(spider.crawl_secs)) {
        tracing::info!(queued = pool.queued(), "crawl budget elapsed, draining queue");
    }
    let pool_stats = pool.shutdown();
    store.flush()?;

    let stats = crawler.stats();
    tracing::info!(
        jobs = pool_stats.processed,
        panicked = pool_stats.panicked,
        indexed = stats.indexed.load(Ordering::Relaxed),
        fetch_failures = stats.fetch_failures.load(Ordering::Relaxed),
        store_failures = stats.store_failures.load(Ordering::Relaxed),
        documents = store.document_count(),
        "crawl finished"
    );
    Ok(())
}
