//! URL Rewriter
//!
//! Presigned URLs are minted against the cluster-local endpoint. Before one
//! leaves the process, its origin is swapped for the externally reachable
//! base so the client can follow it.

use url::Url;

use super::StoreUrl;

/// Internal → external URL translation
#[derive(Debug, Clone, Default)]
pub struct UrlRewriter {
    internal: Option<Url>,
    external: Option<String>,
}

impl UrlRewriter {
    /// Rewriter for the given internal endpoint URL and optional external base.
    ///
    /// Rewriting is disabled when no external base is set, or when the
    /// external base has the same origin as the internal endpoint.
    pub fn new(internal_endpoint: &str, external_base: Option<&str>) -> Self {
        let internal = match Url::parse(internal_endpoint) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!("Cannot parse storage endpoint {:?}: {}", internal_endpoint, e);
                return Self::default();
            }
        };

        let external = match external_base.map(|b| b.trim_end_matches('/')) {
            Some(b) if !b.is_empty() => b.to_string(),
            _ => return Self::default(),
        };

        if Url::parse(&external).map(|e| same_origin(&e, &internal)).unwrap_or(false) {
            tracing::warn!("External URL shares the storage endpoint origin; rewriting disabled");
            return Self::default();
        }

        Self {
            internal: Some(internal),
            external: Some(external),
        }
    }

    /// Whether any rewriting will happen
    pub fn is_enabled(&self) -> bool {
        self.internal.is_some() && self.external.is_some()
    }

    /// Rewrite a URL whose origin is the internal endpoint; others pass through
    pub fn rewrite(&self, url: &str) -> String {
        let (internal, external) = match (&self.internal, &self.external) {
            (Some(i), Some(e)) => (i, e),
            _ => return url.to_string(),
        };

        match Url::parse(url) {
            Ok(parsed) if same_origin(&parsed, internal) => {
                format!("{}{}", external, after_authority(url))
            }
            _ => url.to_string(),
        }
    }

    /// Rewrite a store URL if the store flagged it as internal
    pub fn apply(&self, url: StoreUrl) -> String {
        if url.internal {
            self.rewrite(&url.url)
        } else {
            url.url
        }
    }
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Path, query and fragment of `url`, byte for byte
fn after_authority(url: &str) -> &str {
    let start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[start..].find(|c: char| c == '/' || c == '?' || c == '#') {
        Some(i) => &url[start + i..],
        None => "",
    }
}
