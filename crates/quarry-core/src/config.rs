//! Engine configuration loaded from TOML.
//!
//! Every section is optional; missing keys take their defaults and unknown
//! keys are rejected.

use crate::db::sql::SqlDialect;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {message}")]
    Io { path: String, message: String },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

///
/// EngineConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub pagination: PaginationConfig,
    pub text_search: TextSearchConfig,
    pub sql: SqlConfig,
    /// Sessions built from this config log each assembly and execution.
    pub debug: bool,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;

        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let page = &self.pagination;
        if page.max_per_page == 0 {
            return Err(ConfigError::Invalid {
                field: "pagination.max_per_page",
                message: "must be at least 1".to_string(),
            });
        }
        if let Some(default) = page.default_per_page
            && (default == 0 || default > page.max_per_page)
        {
            return Err(ConfigError::Invalid {
                field: "pagination.default_per_page",
                message: format!("must be between 1 and {}", page.max_per_page),
            });
        }
        if self.text_search.min_term_len == 0 {
            return Err(ConfigError::Invalid {
                field: "text_search.min_term_len",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

///
/// PaginationConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaginationConfig {
    /// Page size when `per_page` is not supplied; unpaged when unset.
    pub default_per_page: Option<u32>,
    pub max_per_page: u32,
}

impl PaginationConfig {
    pub const DEFAULT_MAX_PER_PAGE: u32 = 100;
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_per_page: None,
            max_per_page: Self::DEFAULT_MAX_PER_PAGE,
        }
    }
}

///
/// TextSearchConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TextSearchConfig {
    /// Shorter terms are ignored rather than matched.
    pub min_term_len: usize,
}

impl Default for TextSearchConfig {
    fn default() -> Self {
        Self { min_term_len: 1 }
    }
}

///
/// SqlConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlConfig {
    pub dialect: SqlDialect,
}

///
/// TESTS
///
