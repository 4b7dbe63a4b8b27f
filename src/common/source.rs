use std::{collections::HashMap, sync::Arc};

use anyhow::{Result, anyhow};

/// Read-only access to remote resources (index pages, archives) by URL.
pub trait RemoteSource {
    fn get(&self, url: &str) -> Result<Arc<[u8]>>;
}

/// Simple in-memory source, keyed by full URL. Used for offline runs and tests.
#[derive(Debug, Default, Clone)]
pub struct MemSource {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemSource {
    pub fn new() -> Self { Self::default() }

    /// Register `bytes` as the response body for `url`.
    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), Arc::from(bytes.into()));
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }
}

impl RemoteSource for MemSource {
    fn get(&self, url: &str) -> Result<Arc<[u8]>> {
        self.files.get(url).cloned()
            .ok_or_else(|| anyhow!("404 Not Found: {url}"))
    }
}

/// Per-run memo of fetched resources, passed explicitly to whoever needs it.
/// Not shared between runs; the disk cache behind `HttpSource` covers that.
#[derive(Debug, Default)]
pub struct SessionCache {
    bodies: HashMap<String, Arc<[u8]>>,
    listings: HashMap<String, Arc<[String]>>,
}

impl SessionCache {
    pub fn new() -> Self { Self::default() }

    /// Fetch `url` through `source` at most once per session.
    pub fn fetch(&mut self, source: &dyn RemoteSource, url: &str) -> Result<Arc<[u8]>> {
        if let Some(bytes) = self.bodies.get(url) {
            return Ok(bytes.clone());
        }
        let bytes = source.get(url)?;
        self.bodies.insert(url.to_string(), bytes.clone());
        Ok(bytes)
    }

    /// Memoize a parsed listing for `url`, computing it with `parse` on first use.
    pub fn listing(
        &mut self,
        source: &dyn RemoteSource,
        url: &str,
        parse: impl FnOnce(&[u8]) -> Vec<String>,
    ) -> Result<Arc<[String]>> {
        if let Some(listing) = self.listings.get(url) {
            return Ok(listing.clone());
        }
        let body = self.fetch(source, url)?;
        let listing: Arc<[String]> = Arc::from(parse(&body));
        self.listings.insert(url.to_string(), listing.clone());
        Ok(listing)
    }

    /// Number of distinct URLs fetched so far.
    #[inline] pub fn len(&self) -> usize { self.bodies.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.bodies.is_empty() }
}
