pub mod download;
pub mod merge;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use icalcombine_core::{CombineConfig, directory};

pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Everything a command needs, loaded and checked once per invocation.
pub struct RunContext {
    pub config: CombineConfig,
    pub download_dir: PathBuf,
    pub export_dir: PathBuf,
}

impl RunContext {
    /// Load the config and make sure both directories exist and are writable.
    pub fn load(config_path: &Path) -> Result<Self> {
        let path = locate_config(config_path, dirs::config_dir());
        let config = CombineConfig::load(&path)
            .context("Something went wrong reading the config file")?;

        let download_dir = config.download_dir()?;
        let export_dir = config.export_dir()?;
        for dir in [&download_dir, &export_dir] {
            directory::prepare(dir)?;
        }

        Ok(RunContext {
            config,
            download_dir,
            export_dir,
        })
    }
}

/// Without an explicit `--configfile`, fall back to
/// `~/.config/icalcombine/config.json` when `./config.json` is absent.
fn locate_config(path: &Path, config_dir: Option<PathBuf>) -> PathBuf {
    if path.exists() || path != Path::new(DEFAULT_CONFIG_PATH) {
        return path.to_path_buf();
    }

    config_dir
        .map(|dir| dir.join("icalcombine").join("config.json"))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| path.to_path_buf())
}
