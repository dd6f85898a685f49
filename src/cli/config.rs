use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::args::{ProjectArgs, ServeArgs};

/// Top-level representation of `.pysymindex/config.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub project: Option<ProjectSection>,

    #[serde(default)]
    pub serve: Option<ServeSection>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub no_server: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServeSection {
    #[serde(default)]
    pub addr: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Discover and load a project-local `.pysymindex/config.toml` (or
/// `.pysymindex/pysymindex.toml`), walking up from the current
/// working directory.
pub fn load_cli_config() -> Result<Option<CliConfig>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let Some(path) = find_project_config(&cwd) else {
        return Ok(None);
    };

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: CliConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse TOML config at {}", path.display()))?;

    Ok(Some(config))
}

fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);

    while let Some(current) = dir {
        let config_dir = current.join(".pysymindex");
        let config_toml = config_dir.join("config.toml");
        if config_toml.is_file() {
            return Some(config_toml);
        }

        let alt_toml = config_dir.join("pysymindex.toml");
        if alt_toml.is_file() {
            return Some(alt_toml);
        }

        dir = current.parent();
    }

    None
}

pub fn apply_project_config_defaults(config: &CliConfig, args: &mut ProjectArgs) {
    let Some(project) = &config.project else {
        return;
    };

    if args.cache_dir.is_none() {
        if let Some(cache_dir) = &project.cache_dir {
            args.cache_dir = Some(cache_dir.clone());
        }
    }

    if args.server.is_none() {
        if let Some(server) = &project.server {
            args.server = Some(server.clone());
        }
    }

    if !args.no_server {
        if let Some(true) = project.no_server {
            args.no_server = true;
        }
    }
}

pub fn apply_serve_config_defaults(config: &CliConfig, args: &mut ServeArgs) {
    let Some(serve) = &config.serve else {
        return;
    };

    if args.addr == "127.0.0.1:7879" {
        if let Some(addr) = &serve.addr {
            args.addr = addr.clone();
        }
    }

    if args.cache_dir.is_none() {
        if let Some(cache_dir) = &serve.cache_dir {
            args.cache_dir = Some(cache_dir.clone());
        }
    }
}
