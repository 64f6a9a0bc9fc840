//! Error types for SolarFund

use thiserror::Error;

/// Main error type for allocation operations
#[derive(Debug, Error)]
pub enum AllocationError {
    /// A fund's target capacity cannot serve as a base for its bounds
    #[error("Configuration error for fund '{fund}': {reason}")]
    Configuration { fund: String, reason: String },

    /// The systems dataset does not have the shape the run needs
    #[error("Data shape error: {0}")]
    DataShape(#[from] DataShapeError),

    /// A fund named in a request does not exist
    #[error("Unknown fund: {0}")]
    UnknownFund(String),
}

impl AllocationError {
    /// Creates a configuration error for the named fund.
    pub fn configuration(fund: impl Into<String>, reason: impl Into<String>) -> Self {
        AllocationError::Configuration {
            fund: fund.into(),
            reason: reason.into(),
        }
    }
}

/// Problems with the rectangular systems dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataShapeError {
    /// Columns required by the run are absent from the dataset
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A record lacks values for declared columns
    #[error("system '{id}' has no value for columns: {}", .missing.join(", "))]
    RaggedRecord { id: String, missing: Vec<String> },

    /// FMV is negative, NaN or infinite
    #[error("system '{id}' has invalid FMV {value}")]
    InvalidFmv { id: String, value: f64 },

    /// Two records share an identifier
    #[error("duplicate system identifier '{0}'")]
    DuplicateId(String),
}

/// A condition that could not be turned into a usable predicate or budget.
///
/// Never fatal: the offending condition is skipped and the error is kept as
/// a warning next to the fund's results.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("fund '{fund}', constraint '{constraint}', condition #{condition}: {reason}")]
pub struct ConstraintResolutionError {
    pub fund: String,
    pub constraint: String,
    /// Zero-based position of the condition within its constraint.
    pub condition: usize,
    pub reason: String,
}

impl ConstraintResolutionError {
    pub fn new(
        fund: impl Into<String>,
        constraint: impl Into<String>,
        condition: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            fund: fund.into(),
            constraint: constraint.into(),
            condition,
            reason: reason.into(),
        }
    }
}

/// Result type alias for allocation operations
pub type Result<T> = std::result::Result<T, AllocationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let err = DataShapeError::MissingColumns(vec!["state".into(), "Stage".into()]);
        assert_eq!(err.to_string(), "missing required columns: state, Stage");
    }

    #[test]
    fn test_data_shape_converts_into_allocation_error() {
        let err: AllocationError = DataShapeError::DuplicateId("S1".into()).into();
        assert!(matches!(err, AllocationError::DataShape(_)));
        assert_eq!(
            err.to_string(),
            "Data shape error: duplicate system identifier 'S1'"
        );
    }

    #[test]
    fn test_resolution_error_message() {
        let err = ConstraintResolutionError::new("F", "StateCap", 1, "missing operator");
        assert_eq!(
            err.to_string(),
            "fund 'F', constraint 'StateCap', condition #1: missing operator"
        );
    }
}
