use reqwest::{header, Client};
use sift_core::error::FetchError;
use sift_core::Link;
use std::time::Duration;
use tokio::runtime::Handle;
use url::Url;

/// Page retrieval used by crawl jobs. Failures mean "no content".
pub trait Fetcher: Send + Sync {
    fn fetch(&self, link: &Link) -> Result<String, FetchError>;
}

/// reqwest client driven from worker threads through a tokio runtime handle.
pub struct HttpFetcher {
    client: Client,
    runtime: Handle,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration, runtime: Handle) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, runtime })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, link: &Link) -> Result<String, FetchError> {
        let raw = link.to_string();
        let url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl { url: raw.clone(), reason: e.to_string() })?;

        // Must not be called from inside the runtime; crawl workers are plain threads.
        self.runtime.block_on(async {
            let resp = self
                .client
                .get(url)
                .header(header::ACCEPT, "text/html,*/*;q=0.8")
                .send()
                .await
                .map_err(|e| FetchError::Request { url: raw.clone(), reason: e.to_string() })?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FetchError::Status { url: raw.clone(), status: status.as_u16() });
            }
            let body = resp
                .text()
                .await
                .map_err(|e| FetchError::Request { url: raw.clone(), reason: e.to_string() })?;
            if body.is_empty() {
                return Err(FetchError::EmptyBody(raw.clone()));
            }
            Ok(body)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fetcher(rt: &tokio::runtime::Runtime) -> HttpFetcher {
        HttpFetcher::new("sift-test", Duration::from_secs(5), rt.handle().clone()).unwrap()
    }

    fn link(server: &MockServer, path: &str) -> Link {
        Link::parse(&server.url(path)).unwrap()
    }

    #[test]
    fn fetches_body() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/page");
            then.status(200).header("content-type", "text/html").body("<title>T</title>hello");
        });
        let body = fetcher(&rt).fetch(&link(&server, "/page")).unwrap();
        assert_eq!(body, "<title>T</title>hello");
        mock.assert();
    }

    #[test]
    fn non_success_status_is_failure() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing");
            then.status(404).body("gone");
        });
        let err = fetcher(&rt).fetch(&link(&server, "/missing")).unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
    }

    #[test]
    fn empty_body_is_failure() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/empty");
            then.status(200);
        });
        let err = fetcher(&rt).fetch(&link(&server, "/empty")).unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody(_)));
    }
}
