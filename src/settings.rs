use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::common;

pub const ENV_BILLING_ID: &str = "ATLASBR_BILLING_ID";
pub const ENV_CACHE_DIR: &str = "ATLASBR_CACHE_DIR";

/// Fallback project variables, checked in order after `ATLASBR_BILLING_ID`.
const ENV_PROJECT_FALLBACKS: [&str; 2] = ["GCLOUD_PROJECT_ID", "GOOGLE_CLOUD_PROJECT"];

const DEFAULT_CACHE_DIR: &str = ".atlasbr_cache";

/// Runtime configuration: the warehouse billing project and the disk cache location.
/// Explicit `with_*` overrides win over environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    billing_id: Option<String>,
    cache_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self { billing_id: None, cache_dir: PathBuf::from(DEFAULT_CACHE_DIR) }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let billing_id = std::iter::once(ENV_BILLING_ID)
            .chain(ENV_PROJECT_FALLBACKS)
            .find_map(|key| non_empty(key));

        let cache_dir = non_empty(ENV_CACHE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR));

        Self { billing_id, cache_dir }
    }

    pub fn with_billing_id(mut self, billing_id: impl Into<String>) -> Self {
        self.billing_id = Some(billing_id.into());
        self
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// The warehouse billing project, or an error explaining how to set one.
    pub fn billing_id(&self) -> Result<&str> {
        self.billing_id.as_deref().ok_or_else(|| anyhow!(
            "billing project not set; set '{ENV_BILLING_ID}' or 'GOOGLE_CLOUD_PROJECT', \
             or call Settings::with_billing_id"
        ))
    }

    /// Cache directory path, without touching the filesystem.
    #[inline] pub fn cache_path(&self) -> &Path { &self.cache_dir }

    /// Cache directory, created on demand.
    pub fn cache_dir(&self) -> Result<&Path> {
        common::ensure_dir_exists(&self.cache_dir)
            .with_context(|| format!("cache directory unavailable: {}", self.cache_dir.display()))?;
        Ok(&self.cache_dir)
    }
}

/// Enable console logging for the library. `RUST_LOG` takes precedence over `level`.
/// Calling this more than once is harmless.
pub fn configure_logging(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("atlasbr={}", level.as_str().to_ascii_lowercase())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn billing_id_prefers_dedicated_variable() {
        let settings = Settings::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_PROJECT", "fallback"),
            ("ATLASBR_BILLING_ID", "primary"),
        ]));
        assert_eq!(settings.billing_id().unwrap(), "primary");
    }

    #[test]
    fn billing_id_falls_back_in_order() {
        let settings = Settings::from_lookup(lookup(&[
            ("GOOGLE_CLOUD_PROJECT", "second"),
            ("GCLOUD_PROJECT_ID", "first"),
        ]));
        assert_eq!(settings.billing_id().unwrap(), "first");
    }

    #[test]
    fn missing_billing_id_is_an_error() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert!(settings.billing_id().is_err());
        assert_eq!(settings.cache_path(), Path::new(DEFAULT_CACHE_DIR));
    }

    #[test]
    fn explicit_overrides_win() {
        let settings = Settings::from_lookup(lookup(&[("ATLASBR_CACHE_DIR", "/tmp/env")]))
            .with_cache_dir("/tmp/explicit")
            .with_billing_id("project");
        assert_eq!(settings.cache_path(), Path::new("/tmp/explicit"));
        assert_eq!(settings.billing_id().unwrap(), "project");
    }
}
