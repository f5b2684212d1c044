//! Resource fetching and URL resolution
//!
//! External buffers and images are pulled through the [`Fetcher`]
//! collaborator. The default [`ResourceFetcher`] understands `data:` URIs and
//! local files; anything else needs a custom fetcher.

use crate::cache::{FileCache, ResolveMetricsHandle};
use crate::error::{DecodeError, Result};
use crate::runtime::BoxFuture;
use base64::Engine;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// Collaborator that retrieves bytes for a resolved URL
pub trait Fetcher: Send + Sync + fmt::Debug {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>>>;
}

/// Default fetcher for `data:` URIs and local files
///
/// Files are read with `tokio::fs` when the `runtime-tokio` feature is on,
/// blocking `std::fs` otherwise. An optional [`FileCache`] keeps recently
/// fetched files in memory.
#[derive(Debug, Clone, Default)]
pub struct ResourceFetcher {
    cache: Option<FileCache>,
    metrics: Option<ResolveMetricsHandle>,
}

impl ResourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep fetched files in `cache`
    pub fn with_cache(mut self, cache: FileCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Record fetch sizes and timings into `metrics`
    pub fn with_metrics(mut self, metrics: ResolveMetricsHandle) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cache(&self) -> Option<&FileCache> {
        self.cache.as_ref()
    }

    /// Reads through `tokio::fs` when called inside a Tokio runtime
    async fn read_file(path: &str) -> io::Result<Vec<u8>> {
        #[cfg(feature = "runtime-tokio")]
        if tokio::runtime::Handle::try_current().is_ok() {
            return tokio::fs::read(path).await;
        }
        std::fs::read(path)
    }
}

impl Fetcher for ResourceFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Arc<[u8]>>> {
        Box::pin(self.fetch_url(url))
    }
}

impl ResourceFetcher {
    async fn fetch_url(&self, url: &str) -> Result<Arc<[u8]>> {
        if is_data_uri(url) {
            return decode_data_uri(url).map(Arc::from);
        }
        if is_remote(url) || url.starts_with("blob:") {
            return Err(DecodeError::io(
                url,
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    "remote resources need a custom Fetcher",
                ),
            ));
        }

        if let Some(bytes) = self.cache.as_ref().and_then(|cache| cache.get(url)) {
            log::debug!("File cache hit for {url}");
            return Ok(bytes);
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        let start = Instant::now();
        let bytes: Arc<[u8]> = Self::read_file(path)
            .await
            .map_err(|err| DecodeError::io(url, err))?
            .into();

        log::debug!("Fetched {} bytes from {url}", bytes.len());
        if let Some(metrics) = &self.metrics {
            metrics.record_fetch(url.to_string(), bytes.len(), start.elapsed());
        }
        if let Some(cache) = &self.cache {
            cache.insert(url, Arc::clone(&bytes));
        }
        Ok(bytes)
    }
}

fn is_remote(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

fn is_data_uri(url: &str) -> bool {
    url.get(..5)
        .map_or(false, |scheme| scheme.eq_ignore_ascii_case("data:"))
        && url.contains(',')
}

/// Resolve `url` against the base `path`
///
/// Absolute, protocol-relative, `data:` and `blob:` URLs are returned as is.
/// A root-relative URL against an http(s) base keeps only the origin of the
/// base.
pub fn resolve_url(url: &str, path: &str) -> String {
    if url.is_empty() {
        return String::new();
    }

    let mut base = path;
    if url.starts_with('/') && is_http(path) {
        base = origin(path);
    }

    if is_remote(url) || is_data_uri(url) || url.starts_with("blob:") {
        return url.to_string();
    }

    format!("{base}{url}")
}

fn is_http(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn origin(path: &str) -> &str {
    let scheme_end = path.find("://").map_or(0, |i| i + 3);
    match path[scheme_end..].find('/') {
        Some(i) => &path[..scheme_end + i],
        None => path,
    }
}

/// Directory part of `url`, including the trailing slash
pub fn extract_url_base(url: &str) -> String {
    match url.rfind('/') {
        Some(i) => url[..=i].to_string(),
        None => "./".to_string(),
    }
}

/// Decode the payload of a `data:` URI
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| DecodeError::format("Malformed data URI"))?;

    if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|err| DecodeError::format(format!("Invalid base64 in data URI: {err}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}
