use crate::error::ConfigError;
use crate::link::Link;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub spider: SpiderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Whole-connection deadline, read to write.
    pub deadline_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".into(), port: 8080, deadline_secs: 30 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpiderConfig {
    pub start_url: String,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_crawl_secs")]
    pub crawl_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_num_threads() -> usize { 4 }
fn default_max_depth() -> u32 { 1 }
fn default_crawl_secs() -> u64 { 10 }
fn default_fetch_timeout_secs() -> u64 { 12 }
fn default_user_agent() -> String { "sift-spider/0.1".into() }

impl SpiderConfig {
    pub fn start_link(&self) -> Result<Link, ConfigError> {
        Link::parse(self.start_url.trim()).ok_or_else(|| ConfigError::Invalid {
            section: "spider",
            key: "start_url",
            reason: format!("'{}' is not an absolute http(s) url", self.start_url),
        })
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config: Config =
            toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.spider.num_threads == 0 {
            return Err(ConfigError::Invalid { section: "spider", key: "num_threads", reason: "must be at least 1".into() });
        }
        if self.server.deadline_secs == 0 {
            return Err(ConfigError::Invalid { section: "server", key: "deadline_secs", reason: "must be at least 1".into() });
        }
        self.spider.start_link()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn loads_with_defaults() {
        let f = write_config(
            r#"
            [store]
            path = "./data/index"

            [spider]
            start_url = "https://example.com"
            max_depth = 2
            "#,
        );
        let config = Config::load(f.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.spider.num_threads, 4);
        assert_eq!(config.spider.max_depth, 2);
        assert_eq!(config.spider.start_link().unwrap().to_string(), "https://example.com/");
    }

    #[test]
    fn rejects_bad_seed_and_zero_threads() {
        let f = write_config("[store]\npath = \"x\"\n[spider]\nstart_url = \"example.com\"\n");
        assert!(matches!(Config::load(f.path()), Err(ConfigError::Invalid { key: "start_url", .. })));

        let f = write_config("[store]\npath = \"x\"\n[spider]\nstart_url = \"http://a/\"\nnum_threads = 0\n");
        assert!(matches!(Config::load(f.path()), Err(ConfigError::Invalid { key: "num_threads", .. })));
    }

    #[test]
    fn missing_file_is_read_error() {
        assert!(matches!(Config::load("/nonexistent/sift.toml"), Err(ConfigError::Read { .. })));
    }
}
