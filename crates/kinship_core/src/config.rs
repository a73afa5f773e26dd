//! Process-level settings for the CLI.
//!
//! Library types never read the environment; they take explicit values
//! (`Storage::open(root)`, `init_logging(&config)`). Only binaries resolve
//! those values through [`KinshipConfig`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const STORAGE_DIR_VAR: &str = "KINSHIP_STORAGE_DIR";
pub const LOG_LEVEL_VAR: &str = "KINSHIP_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "KINSHIP_LOG_DIR";

const DEFAULT_STORAGE_DIR: &str = "kinship-data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KinshipConfig {
    pub storage_dir: PathBuf,
    pub log_level: &'static str,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for KinshipConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl KinshipConfig {
    /// Reads `KINSHIP_STORAGE_DIR`, `KINSHIP_LOG_LEVEL` and `KINSHIP_LOG_DIR`.
    ///
    /// # Errors
    /// - Unsupported log level.
    /// - Log directory that is not absolute.
    pub fn from_env() -> Result<Self, String> {
        let vars: HashMap<String, String> = [STORAGE_DIR_VAR, LOG_LEVEL_VAR, LOG_DIR_VAR]
            .into_iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.to_string(), value)))
            .collect();
        Self::from_vars(&vars)
    }

    /// Same as [`KinshipConfig::from_env`] over an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(dir) = non_blank(vars, STORAGE_DIR_VAR) {
            config.storage_dir = PathBuf::from(dir);
        }
        if let Some(level) = non_blank(vars, LOG_LEVEL_VAR) {
            config.log_level = normalize_level(level)?;
        }
        if let Some(dir) = non_blank(vars, LOG_DIR_VAR) {
            config.log_dir = Some(normalize_log_dir(dir)?);
        }
        Ok(config)
    }

    /// Replaces the storage directory when the caller passed one explicitly.
    pub fn with_storage_dir(mut self, dir: Option<impl Into<PathBuf>>) -> Self {
        if let Some(dir) = dir {
            self.storage_dir = dir.into();
        }
        self
    }
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let path = Path::new(log_dir);
    if !path.is_absolute() {
        return Err(format!("{LOG_DIR_VAR} must be an absolute path, got `{log_dir}`"));
    }
    Ok(path.to_path_buf())
}

fn non_blank<'a>(vars: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{default_log_level, KinshipConfig, LOG_DIR_VAR, LOG_LEVEL_VAR, STORAGE_DIR_VAR};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = KinshipConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config, KinshipConfig::default());
        assert_eq!(config.log_level, default_log_level());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn values_are_read_and_level_normalized() {
        let log_dir = std::env::temp_dir().join("kinship-config-logs");
        let config = KinshipConfig::from_vars(&vars(&[
            (STORAGE_DIR_VAR, "/srv/tree"),
            (LOG_LEVEL_VAR, " Warning "),
            (LOG_DIR_VAR, log_dir.to_str().unwrap()),
        ]))
        .unwrap();
        assert_eq!(config.storage_dir, PathBuf::from("/srv/tree"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(log_dir));
    }

    #[test]
    fn blank_values_are_ignored() {
        let config =
            KinshipConfig::from_vars(&vars(&[(STORAGE_DIR_VAR, "  "), (LOG_LEVEL_VAR, "")]))
                .unwrap();
        assert_eq!(config, KinshipConfig::default());
    }

    #[test]
    fn rejects_unknown_level_and_relative_log_dir() {
        let error = KinshipConfig::from_vars(&vars(&[(LOG_LEVEL_VAR, "loud")])).unwrap_err();
        assert!(error.contains("unsupported log level"));

        let error = KinshipConfig::from_vars(&vars(&[(LOG_DIR_VAR, "logs")])).unwrap_err();
        assert!(error.contains("absolute"));
    }

    #[test]
    fn explicit_storage_dir_wins() {
        let config = KinshipConfig::default().with_storage_dir(Some("other"));
        assert_eq!(config.storage_dir, PathBuf::from("other"));
        let config = KinshipConfig::default().with_storage_dir(None::<PathBuf>);
        assert_eq!(config.storage_dir, PathBuf::from("kinship-data"));
    }
}
