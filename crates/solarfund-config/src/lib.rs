//! Configuration for SolarFund allocation runs.
//!
//! Two kinds of input live here:
//! - [`ConstraintDocument`]: the declarative per-fund constraint document,
//!   readable and writable as JSON, YAML or TOML.
//! - [`AllocationConfig`]: run settings (column names, backlog and existing
//!   book selection, per-customer cap), usually loaded from
//!   `allocation.toml`.
//!
//! # Examples
//!
//! Load settings from a TOML string:
//!
//! ```
//! use solarfund_config::AllocationConfig;
//!
//! let config = AllocationConfig::from_toml_str(r#"
//!     per_customer_cap = 125000
//!
//!     [backlog]
//!     customer = "Developer LLC"
//!     excluded_stages = ["Substantial", "On Hold"]
//! "#).unwrap();
//!
//! assert_eq!(config.backlog.customer.as_deref(), Some("Developer LLC"));
//! assert_eq!(config.per_customer_cap, Some(125_000.0));
//! assert_eq!(config.columns.stage, "Stage");
//! ```
//!
//! Use defaults when the file is missing:
//!
//! ```
//! use solarfund_config::AllocationConfig;
//!
//! let config = AllocationConfig::load("allocation.toml").unwrap_or_default();
//! assert!(config.per_customer_cap.is_none());
//! ```

mod document;

pub use document::{
    ConditionSpec, ConditionValues, ConstraintDocument, ConstraintSpec, DocumentFormat, FundSpec,
    ResolvedFunds, ScalarValue,
};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for one allocation run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct AllocationConfig {
    /// Names of the dataset columns the run reads.
    #[serde(default)]
    pub columns: ColumnConfig,

    /// Which systems are offered to funds.
    #[serde(default)]
    pub backlog: BacklogConfig,

    /// Which systems count as a fund's existing book.
    #[serde(default)]
    pub existing: ExistingConfig,

    /// Absolute FMV limit per customer account per fund.
    #[serde(default)]
    pub per_customer_cap: Option<f64>,
}

impl AllocationConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist, contains invalid TOML, or
    /// holds values that fail [`AllocationConfig::validate`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(cap) = self.per_customer_cap {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "per_customer_cap must be a positive amount, got {cap}"
                )));
            }
        }
        for (key, column) in [
            ("columns.customer", &self.columns.customer),
            ("columns.stage", &self.columns.stage),
            ("columns.customer_account", &self.columns.customer_account),
        ] {
            if column.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }
        Ok(())
    }

    /// Enables the per-customer FMV cap.
    pub fn with_per_customer_cap(mut self, cap: f64) -> Self {
        self.per_customer_cap = Some(cap);
        self
    }

    /// Restricts the backlog to systems owned by one customer.
    pub fn with_backlog_customer(mut self, customer: impl Into<String>) -> Self {
        self.backlog.customer = Some(customer.into());
        self
    }
}

/// Dataset column names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ColumnConfig {
    /// Portfolio owner of a system; a fund's name for systems it holds.
    pub customer: String,

    /// Lifecycle stage.
    pub stage: String,

    /// Account used by the per-customer cap.
    pub customer_account: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            customer: "Asset Portfolio - Customer".to_string(),
            stage: "Stage".to_string(),
            customer_account: "Customer Account".to_string(),
        }
    }
}

/// Backlog selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct BacklogConfig {
    /// Customer that owns backlog systems. When unset, every system whose
    /// customer is not one of the requested funds is backlog.
    pub customer: Option<String>,

    /// Stages never offered to funds.
    pub excluded_stages: Vec<String>,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            customer: None,
            excluded_stages: vec!["Substantial".to_string()],
        }
    }
}

/// Existing-book selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ExistingConfig {
    /// Stages that do not count toward a fund's existing allocation.
    pub excluded_stages: Vec<String>,
}

impl Default for ExistingConfig {
    fn default() -> Self {
        Self {
            excluded_stages: vec!["Cancelled".to_string()],
        }
    }
}

#[cfg(test)]
mod tests;
