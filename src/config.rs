use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConvertError, Result};

/// Language code used for legacy records with an empty or unrecognized
/// language attribute. Kept as a real language term so no content is lost.
pub const UNKNOWN_LANGUAGE: &str = "zz";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub target: TargetConfig,
    pub prefixes: PrefixConfig,
    #[serde(default)]
    pub languages: LanguageConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path to the SQLite database holding both legacy and target tables.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetConfig {
    /// Root directory of the target platform installation.
    pub root_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixConfig {
    /// Legacy (SMK) table-name prefix, e.g. "smk_".
    pub old: String,
    /// Target content table prefix, e.g. "wp_".
    pub new: String,
    /// Target user table prefix, e.g. "wpu_".
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    /// Preferred language when choosing the canonical display name for a
    /// merged term group. Falls back to the lexicographically smallest
    /// language code in the group when the default is absent.
    #[serde(default = "default_language")]
    pub default: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            default: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    /// When true, the cleanup step drops the legacy language columns from
    /// the target content tables.
    #[serde(default)]
    pub strip_language_columns: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|_| ConvertError::ConfigNotFound(path.to_path_buf()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .map_err(|e| ConvertError::ConfigInvalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (label, prefix) in [
            ("prefixes.old", &self.prefixes.old),
            ("prefixes.new", &self.prefixes.new),
            ("prefixes.user", &self.prefixes.user),
        ] {
            if prefix.is_empty() {
                return Err(ConvertError::ConfigInvalid(format!(
                    "{label} must not be empty"
                )));
            }
            if !prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(ConvertError::ConfigInvalid(format!(
                    "{label} '{prefix}' contains characters other than ASCII alphanumerics and '_'"
                )));
            }
        }
        if self.prefixes.old == self.prefixes.new {
            return Err(ConvertError::ConfigInvalid(
                "prefixes.old and prefixes.new must differ".to_string(),
            ));
        }
        if self.languages.default.is_empty() {
            return Err(ConvertError::ConfigInvalid(
                "languages.default must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
