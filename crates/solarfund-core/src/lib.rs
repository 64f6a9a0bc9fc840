//! SolarFund Core - domain types for constraint-capped fund allocation
//!
//! This crate provides the data model shared by the other SolarFund crates:
//! - Funds, constraints, and conditions
//! - Candidate system records and the rectangular dataset carrying them
//! - Error types for configuration, data shape, and constraint resolution

pub mod condition;
pub mod constraint;
pub mod error;
pub mod fund;
pub mod system;

pub use condition::{
    Condition, ConditionOperator, ConditionShapeError, ConditionValue, UnknownOperator, OTHERS,
};
pub use constraint::{resolve_bound, Constraint, ConstraintCategory, ConstraintKind};
pub use error::{AllocationError, ConstraintResolutionError, DataShapeError, Result};
pub use fund::{Fund, FundTarget, TargetCapacity};
pub use system::{Measure, SystemRecord, SystemTable, FMV};
