//! Run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::acquire::ExportSequence;
use crate::error::{CombineError, CombineResult};

const ENV_PREFIX: &str = "ICALCOMBINE";

/// Configuration for one run, usually read from `config.json`.
///
/// Only the source list and the two directories are required; everything
/// else falls back to defaults that match the CryptPad calendar UI.
#[derive(Debug, Clone, Deserialize)]
pub struct CombineConfig {
    /// Hosted calendars to export, in acquisition order.
    #[serde(rename = "cryptpad_urls")]
    pub sources: Vec<String>,

    pub download_directory: PathBuf,

    pub export_directory: PathBuf,

    #[serde(default)]
    pub browser: BrowserSettings,

    /// What to do with a downloaded file that fails to parse.
    #[serde(default)]
    pub failed_files: FailedFilePolicy,

    #[serde(default)]
    pub export_sequence: ExportSequence,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Chromium/Chrome binary. Looked up on PATH when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub element_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            executable: None,
            headless: true,
            element_timeout_secs: 30,
            download_timeout_secs: 30,
            poll_interval_ms: 250,
        }
    }
}

impl BrowserSettings {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Whether a downloaded file that could not be parsed is removed with the
/// others or left in the download directory for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedFilePolicy {
    #[default]
    Delete,
    Keep,
}

impl CombineConfig {
    /// Load the config file at `path`, with `ICALCOMBINE_*` environment
    /// overrides (`__` separates nested keys).
    pub fn load(path: &Path) -> CombineResult<Self> {
        if !path.is_file() {
            return Err(CombineError::Config(format!(
                "Config file {} not found",
                path.display()
            )));
        }

        let config: CombineConfig = Config::builder()
            .add_source(File::from(path.to_path_buf()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CombineError::Config(format!("{}: {e}", path.display())))?
            .try_deserialize()
            .map_err(|e| CombineError::Config(format!("{}: {e}", path.display())))?;

        Ok(config)
    }

    /// Absolute download directory, with `~` expanded.
    pub fn download_dir(&self) -> CombineResult<PathBuf> {
        resolve_dir(&self.download_directory)
    }

    /// Absolute export directory, with `~` expanded.
    pub fn export_dir(&self) -> CombineResult<PathBuf> {
        resolve_dir(&self.export_directory)
    }
}

fn resolve_dir(dir: &Path) -> CombineResult<PathBuf> {
    let expanded = shellexpand::tilde(&dir.to_string_lossy()).into_owned();
    Ok(std::path::absolute(expanded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_required_keys_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"{
                "cryptpad_urls": ["https://cryptpad.example/calendar/#/a", "https://cryptpad.example/calendar/#/a"],
                "download_directory": "./downloads",
                "export_directory": "/srv/www"
            }"#,
        );

        let config = CombineConfig::load(&path).unwrap();

        assert_eq!(config.sources.len(), 2, "duplicate sources are kept");
        assert_eq!(config.download_directory, PathBuf::from("./downloads"));
        assert_eq!(config.failed_files, FailedFilePolicy::Delete);
        assert!(config.browser.headless);
        assert_eq!(config.browser.element_timeout(), Duration::from_secs(30));
        assert_eq!(config.export_sequence, ExportSequence::default());
    }

    #[test]
    fn test_load_missing_key_names_it() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"{ "cryptpad_urls": [], "download_directory": "./downloads" }"#,
        );

        let err = CombineConfig::load(&path).unwrap_err();

        assert!(
            err.to_string().contains("export_directory"),
            "error should name the missing key, got: {err}"
        );
    }

    #[test]
    fn test_load_optional_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"{
                "cryptpad_urls": [],
                "download_directory": "./downloads",
                "export_directory": "./export",
                "failed_files": "keep",
                "browser": { "headless": false, "download_timeout_secs": 5 }
            }"#,
        );

        let config = CombineConfig::load(&path).unwrap();

        assert_eq!(config.failed_files, FailedFilePolicy::Keep);
        assert!(!config.browser.headless);
        assert_eq!(config.browser.download_timeout(), Duration::from_secs(5));
        assert_eq!(config.browser.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = CombineConfig::load(&tmp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, CombineError::Config(_)));
    }

    #[test]
    fn test_directories_are_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_config(
            tmp.path(),
            r#"{ "cryptpad_urls": [], "download_directory": "downloads", "export_directory": "~/public" }"#,
        );

        let config = CombineConfig::load(&path).unwrap();

        assert!(config.download_dir().unwrap().is_absolute());
        let export = config.export_dir().unwrap();
        assert!(!export.to_string_lossy().contains('~'));
        assert!(export.ends_with("public"));
    }
}
