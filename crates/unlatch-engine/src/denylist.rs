//! Static request denylist of ad and tracking hosts.

use url::Url;

/// Blocks third-party requests to denylisted hosts and their subdomains.
#[derive(Debug, Clone, Default)]
pub struct RequestDenylist {
    hosts: Vec<String>,
}

impl RequestDenylist {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_end_matches('.').to_ascii_lowercase())
            .filter(|h| !h.is_empty())
            .collect();
        Self { hosts }
    }

    /// Whether `host` equals or is a subdomain of a denylisted host.
    pub fn is_blocked_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.hosts.iter().any(|b| {
            host == *b
                || host
                    .strip_suffix(b.as_str())
                    .is_some_and(|rest| rest.ends_with('.'))
        })
    }

    /// Whether a request from the page at `page_url` to `url` is blocked.
    ///
    /// `url` is resolved against the page, so relative and protocol-relative
    /// sources are covered. Same-host requests and URLs without a host are
    /// never blocked.
    pub fn is_blocked(&self, url: &str, page_url: &str) -> bool {
        let base = Url::parse(page_url.trim()).ok();
        let resolved = match &base {
            Some(base) => base.join(url.trim()),
            None => Url::parse(url.trim()),
        };
        let Ok(resolved) = resolved else {
            return false;
        };
        let Some(host) = resolved.host_str() else {
            return false;
        };
        let page_host = base.as_ref().and_then(|b| b.host_str()).unwrap_or("");
        if host.eq_ignore_ascii_case(page_host) {
            return false;
        }
        self.is_blocked_host(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
