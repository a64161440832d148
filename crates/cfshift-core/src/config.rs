use crate::CoreError;
use cfshift_schema::NormalizeOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Domain appended to routes synthesized from the application name.
    #[serde(default)]
    pub default_domain: Option<String>,
    /// Parallel normalization workers; 1 keeps everything on the caller's thread.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Stop at the first failing application instead of reporting all.
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_domain: None,
            workers: default_workers(),
            fail_fast: false,
        }
    }
}

fn default_workers() -> usize {
    1
}

impl Config {
    #[must_use]
    pub fn with_domain(mut self, domain: &str) -> Self {
        self.default_domain = Some(domain.trim().trim_matches('.').to_owned());
        self
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            default_domain: self.default_domain.clone(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| CoreError::Config(format!("invalid config {}: {e}", path.display())))?;
        if config.workers == 0 {
            return Err(CoreError::Config(format!(
                "invalid config {}: workers must be at least 1",
                path.display()
            )));
        }
        Ok(config)
    }

    /// Load `path` if given, else `~/.config/cfshift/config.toml`. A missing
    /// default file yields the built-in defaults; a missing explicit file is
    /// an error.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CoreError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".config/cfshift/config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "default_domain = \"apps.example.com\"\nworkers = 4\nfail_fast = true\n",
        )
        .unwrap();

        let loaded = Config::load(&path).unwrap();
        let expected = Config {
            workers: 4,
            fail_fast: true,
            ..Config::default()
        }
        .with_domain("apps.example.com.");
        assert_eq!(loaded, expected);
        assert_eq!(loaded.default_domain.as_deref(), Some("apps.example.com"));
    }

    #[test]
    fn explicit_path_overrides_default_location() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfshift.toml");
        std::fs::write(&path, "workers = 2\n").unwrap();
        assert_eq!(Config::load_or_default(Some(&path)).unwrap().workers, 2);
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();
        assert_eq!(Config::load(&path).unwrap(), Config::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "domain = \"x\"\n").unwrap();
        assert!(matches!(Config::load(&path), Err(CoreError::Config(_))));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workers = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_or_default(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(CoreError::Io(_))));
    }

    #[test]
    fn options_carry_domain() {
        let config = Config::default().with_domain("example.org");
        assert_eq!(
            config.normalize_options().default_domain.as_deref(),
            Some("example.org")
        );
    }
}
