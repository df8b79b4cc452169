use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

lazy_static! {
    static ref HREF_RE: Regex = Regex::new(r#"<a\s+[^>]*href="([^"]*)""#).expect("valid regex");
    static ref ABSOLUTE_RE: Regex = Regex::new(r"^(https?)://([^/]+)(.*)$").expect("valid regex");
    static ref SCHEME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// An absolute http(s) location split into protocol, host and path-plus-query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Link {
    pub protocol: Protocol,
    pub host: String,
    pub path: String,
}

impl Link {
    /// Parse `(https?)://host(path)`; anything else is `None`. Empty path becomes `/`.
    pub fn parse(url: &str) -> Option<Link> {
        let caps = ABSOLUTE_RE.captures(url)?;
        let protocol = if &caps[1] == "https" { Protocol::Https } else { Protocol::Http };
        let path = match &caps[3] {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        Some(Link { protocol, host: caps[2].to_string(), path })
    }

    /// `scheme://host`, without a trailing slash.
    pub fn origin(&self) -> String {
        format!("{}://{}", self.protocol.scheme(), self.host)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.protocol.scheme(), self.host, self.path)
    }
}

/// Resolve one href against the page it was found on. Relative segments are not collapsed.
fn resolve(base: &Link, href: &str) -> Option<Link> {
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.get(..11).is_some_and(|p| p.eq_ignore_ascii_case("javascript:")) {
        return None;
    }
    let absolute = if SCHEME_RE.is_match(href) {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base.origin(), href)
    } else {
        format!("{}/{}", base.origin(), href)
    };
    Link::parse(&absolute)
}

/// Collect the outbound links of one page. Deduplicated within the page only.
pub fn extract_links(base: &Link, html: &str) -> BTreeSet<Link> {
    let mut links = BTreeSet::new();
    for caps in HREF_RE.captures_iter(html) {
        let href = &caps[1];
        match resolve(base, href) {
            Some(link) => {
                links.insert(link);
            }
            None => tracing::debug!(href, base = %base, "skipping link"),
        }
    }
    links
}
