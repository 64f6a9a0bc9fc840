//! SolarFund - constraint-capped allocation of solar backlogs into funds
//!
//! Declare each fund's constraints in a document, load a dataset of systems,
//! and call [`run_allocation`].
//!
//! # Example
//!
//! ```rust
//! use solarfund::prelude::*;
//!
//! let document = ConstraintDocument::from_json_str(r#"{
//!     "F": {
//!         "capacity": 1000,
//!         "constraints": [{
//!             "name": "StateCap",
//!             "constraint_type": "Upper Bound",
//!             "attribute": "state",
//!             "upper_bound": 0.5,
//!             "conditions": [{ "type": "state", "condition": "In", "values": ["CA"] }]
//!         }]
//!     }
//! }"#).unwrap();
//! let resolved = document.resolve().unwrap();
//!
//! let mut systems = SystemTable::new(["Asset Portfolio - Customer", "Stage", "state"]);
//! for (id, fmv, state) in [("A", 600.0, "CA"), ("B", 300.0, "TX")] {
//!     systems.push(
//!         SystemRecord::new(id, fmv)
//!             .with_attribute("Asset Portfolio - Customer", "Developer")
//!             .with_attribute("Stage", "Pending")
//!             .with_attribute("state", state),
//!     ).unwrap();
//! }
//!
//! let request = AllocationRequest::new(systems)
//!     .with_selected_funds(&resolved.funds, [("F", TargetCapacity::FullCapacity)])
//!     .unwrap();
//! let outcome = run_allocation(&request).unwrap();
//! assert_eq!(outcome.fund("F").unwrap().allocated_fmv, 300.0);
//! ```

// Domain types
pub use solarfund_core::{
    Condition, ConditionOperator, ConditionValue, Constraint, ConstraintCategory, ConstraintKind,
    Fund, FundTarget, Measure, SystemRecord, SystemTable, TargetCapacity, FMV, OTHERS,
};

// Errors
pub use solarfund_core::{
    AllocationError, ConditionShapeError, ConstraintResolutionError, DataShapeError, Result,
};

// Configuration
pub use solarfund_config::{AllocationConfig, ConfigError, ConstraintDocument, DocumentFormat};

// Engine
pub use solarfund_engine::{
    analyze, preview, run_allocation, AllocationOutcome, AllocationRequest, ConstraintReportRow,
    FundBudgets, FundFailure, FundOutcome, FundPreview, Rejection, RejectionLog,
};

/// Lower-level engine building blocks: budgets, matching and the greedy pass.
pub mod engine {
    pub use solarfund_engine::*;
}

/// Declarative document and settings types.
pub mod config {
    pub use solarfund_config::*;
}

#[cfg(feature = "console")]
pub use solarfund_console as console;

pub mod prelude {
    pub use super::{
        AllocationConfig, AllocationOutcome, AllocationRequest, Condition, Constraint,
        ConstraintDocument, Fund, FundTarget, SystemRecord, SystemTable, TargetCapacity,
    };
    pub use super::{preview, run_allocation};
}
