//! SolarFund allocation engine
//!
//! This crate turns fund constraints into budgets and fills funds from a
//! backlog of candidate systems:
//! - Caps (budget initialization and net-out of existing books)
//! - Matcher (which budgets a system consumes)
//! - Eligibility filter (exclusion constraints)
//! - Greedy allocator (largest FMV first, all-or-nothing admission)
//! - Analyzer (constraint utilization report)
//! - Requests (run orchestration and preview)
//!
//! # Logging levels
//!
//! - **INFO**: run and fund lifecycle
//! - **DEBUG**: budget initialization
//! - **TRACE**: individual admissions and rejections
//! - **WARN**: skipped conditions and failed funds

pub mod allocator;
pub mod analyzer;
pub mod caps;
pub mod eligibility;
pub mod matcher;
pub mod request;

pub use allocator::{
    allocate, format_amount, placements, FundLedger, Placement, Rejection, RejectionLog,
    RejectionTally,
};
pub use analyzer::{analyze, ConstraintReportRow};
pub use caps::{Budget, BudgetSelector, FundBudgets};
pub use eligibility::EligibilityFilter;
pub use matcher::MatchedBudgets;
pub use request::{
    preview, run_allocation, AllocationOutcome, AllocationRequest, FundFailure, FundOutcome,
    FundPreview,
};
