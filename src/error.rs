use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("config file '{0}' not found or unreadable")]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    ConfigInvalid(String),

    #[error(
        "target schema already contains table '{0}' (prepare must run against an empty target)"
    )]
    TargetNotEmpty(String),

    #[error("target schema is not prepared (run `smkconv prepare` first): missing table '{0}'")]
    NotPrepared(String),

    #[error("legacy schema is incomplete: missing table '{0}'")]
    LegacySchemaIncomplete(String),

    #[error("target platform is not ready: {0}")]
    TargetNotReady(String),

    #[error("target root path '{0}' does not exist or is not readable")]
    BadTargetRoot(PathBuf),

    #[error("another converter run holds the lock: {0}")]
    Locked(String),

    #[error("translation group '{0}' has a corrupted membership map: {1}")]
    CorruptGroup(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl ConvertError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigNotFound(_) => "config_not_found",
            Self::ConfigInvalid(_) => "config_invalid",
            Self::TargetNotEmpty(_) => "target_not_empty",
            Self::NotPrepared(_) => "not_prepared",
            Self::LegacySchemaIncomplete(_) => "legacy_schema_incomplete",
            Self::TargetNotReady(_) => "target_not_ready",
            Self::BadTargetRoot(_) => "bad_target_root",
            Self::Locked(_) => "locked",
            Self::CorruptGroup(_, _) => "corrupt_group",
            Self::Io(_) => "io_error",
            Self::Yaml(_) => "yaml_error",
            Self::Json(_) => "json_error",
            Self::Db(_) => "db_error",
        }
    }

    /// Precondition failures are reported before any write is attempted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_)
                | Self::ConfigInvalid(_)
                | Self::TargetNotEmpty(_)
                | Self::NotPrepared(_)
                | Self::LegacySchemaIncomplete(_)
                | Self::TargetNotReady(_)
                | Self::BadTargetRoot(_)
                | Self::Locked(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
