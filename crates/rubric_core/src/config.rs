//! Core runtime configuration.
//!
//! # Responsibility
//! - Load optional TOML configuration with complete defaults.
//! - Validate values before they reach logging/storage bootstrap.
//!
//! # Invariants
//! - A missing field always falls back to its default.
//! - `log_dir`, when set, is absolute.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE_NAME: &str = "rubric.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// CSV roster import options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Required column holding the student's display name.
    pub name_header: String,
    /// Optional column naming the student's expertise domain.
    pub domain_header: String,
    /// Optional column holding the learning session label.
    pub session_header: String,
    /// Create domains that do not exist yet instead of leaving the field empty.
    pub create_missing_domains: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            name_header: "Full Name".to_string(),
            domain_header: "Expertise Check".to_string(),
            session_header: "Learning Session".to_string(),
            create_missing_domains: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Rolling log directory; file logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub import: ImportConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE_NAME),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            import: ImportConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parses TOML text and validates the result.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads the file when it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        crate::logging::normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("db_path must not be empty".to_string()));
        }
        if let Some(log_dir) = &self.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    log_dir.display()
                )));
            }
        }
        for (label, header) in [
            ("import.name_header", &self.import.name_header),
            ("import.domain_header", &self.import.domain_header),
            ("import.session_header", &self.import.session_header),
        ] {
            if header.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{label} must not be blank")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = CoreConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.import.name_header, "Full Name");
    }

    #[test]
    fn partial_import_section_keeps_other_defaults() {
        let config = CoreConfig::from_toml_str(
            "log_level = \"warn\"\n[import]\nname_header = \"Student\"\n",
        )
        .unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.import.name_header, "Student");
        assert_eq!(config.import.session_header, "Learning Session");
        assert!(config.import.create_missing_domains);
    }

    #[test]
    fn rejects_relative_log_dir_and_unknown_level() {
        let err = CoreConfig::from_toml_str("log_dir = \"logs\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));

        let err = CoreConfig::from_toml_str("log_level = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file_and_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rubric.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "db_path = \"cohort.sqlite3\"").unwrap();

        let config = CoreConfig::load(&path).unwrap();
        assert_eq!(config.db_path.to_str(), Some("cohort.sqlite3"));

        let fallback = CoreConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(fallback, CoreConfig::default());
    }
}
