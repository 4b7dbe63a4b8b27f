use std::{fs::File, io::Write, path::{Path, PathBuf}, sync::Arc, thread, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client, RequestBuilder, Response};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::common::{RemoteSource, ensure_dir_exists};

const MAX_RETRIES: usize = 3;
const BASE_DELAY_MS: u64 = 500;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Write-then-rename wrapper for atomic cache entries
struct PendingWrite {
    target: PathBuf,
    tmp: NamedTempFile,
}

impl PendingWrite {
    /// Open a temp file next to `target`.
    fn open(target: &Path) -> Result<Self> {
        let parent = target.parent().unwrap_or(Path::new("."));
        ensure_dir_exists(parent)?;
        let tmp = NamedTempFile::new_in(parent).context("create temp file")?;
        Ok(Self { target: target.to_path_buf(), tmp })
    }

    /// Finalize the write; the target only becomes visible once complete.
    fn finalize(self) -> Result<()> {
        self.tmp.as_file().sync_all().ok(); // best-effort fsync file
        self.tmp.persist(&self.target)
            .with_context(|| format!("rename to {}", self.target.display()))?;
        if let Some(dir) = self.target.parent() {
            let _ = File::open(dir).and_then(|f| f.sync_all());
        }
        Ok(())
    }
}

impl Write for PendingWrite {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.tmp.write(buf) }
    fn flush(&mut self) -> std::io::Result<()> { self.tmp.flush() }
}

/// Cache filename for a URL: SHA-256 of the URL plus the URL's own extension.
pub fn url_to_filename(url: &str) -> String {
    let hash = hex::encode(Sha256::digest(url.as_bytes()));
    let name = url.rsplit('/').next().unwrap_or_default();
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            format!("{hash}.{}", ext.to_ascii_lowercase()),
        _ => format!("{hash}.html"),
    }
}

/// HTTP source backed by a durable on-disk cache keyed by URL hash.
pub struct HttpSource {
    client: Client,
    cache_dir: PathBuf,
    max_retries: usize,
    base_delay: Duration,
}

impl HttpSource {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_timeout(cache_dir, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(cache_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("atlasbr/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        })
    }

    /// Location of the cache entry for `url`.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join("ibge").join(url_to_filename(url))
    }

    /// Send a request, retrying transport errors and retryable statuses with linear backoff.
    fn send_with_retries(&self, make_req: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0usize;
        loop {
            match make_req().send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < self.max_retries && is_retryable_status(status) {
                        warn!("HTTP {status}, retrying ({}/{})", attempt + 1, self.max_retries);
                        thread::sleep(self.base_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < self.max_retries && is_retryable_error(&err) {
                        warn!("request failed ({err}), retrying ({}/{})", attempt + 1, self.max_retries);
                        thread::sleep(self.base_delay * (attempt as u32 + 1));
                        attempt += 1;
                        continue;
                    }
                    return Err(anyhow!(err).context("request failed after retries"));
                }
            }
        }
    }

    /// Download `url` into the cache (atomic rename on completion).
    fn download(&self, url: &str, target: &Path) -> Result<()> {
        info!("downloading {url}");
        let mut resp = self.send_with_retries(|| self.client.get(url))
            .with_context(|| format!("GET {url}"))?;

        if !resp.status().is_success() {
            bail!("GET {url} returned {}", resp.status());
        }

        let mut sink = PendingWrite::open(target)?;
        std::io::copy(&mut resp, &mut sink)
            .with_context(|| format!("write {}", target.display()))?;
        sink.finalize()
    }
}

impl RemoteSource for HttpSource {
    fn get(&self, url: &str) -> Result<Arc<[u8]>> {
        let path = self.cache_path(url);
        if path.exists() {
            debug!("cache hit for {url}");
        } else {
            self.download(url, &path)?;
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("read cached {}", path.display()))?;
        Ok(Arc::from(bytes))
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
