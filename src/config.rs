//! Process-wide configuration, threaded explicitly through constructors
//! rather than read from a hidden global.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Cache-directory configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cache_dir: PathBuf,
}

impl AppConfig {
    /// Resolves the cache directory, defaulting to `<cwd>/cache` when
    /// none is given, and ensures it exists.
    pub fn with_cache_dir(cache_dir: Option<PathBuf>) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        std::fs::create_dir_all(&cache_dir).with_context(|| {
            format!("failed to create cache directory at {}", cache_dir.display())
        })?;
        Ok(Self { cache_dir })
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join("cache"))
}
