//! Shared test fixtures for SolarFund crates.
//!
//! This crate provides data builders only; it depends on nothing but
//! `solarfund-core` so every other crate can use it as a dev-dependency.
//!
//! - [`scenario`] - the four-system state-cap scenario and small builders
//! - [`backlog`] - seeded random backlogs and a fund exercising every budget kind
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! solarfund-test = { workspace = true }
//! ```
//!
//! ```
//! use solarfund_test::{scenario_fund, scenario_systems};
//!
//! let fund = scenario_fund();
//! let systems = scenario_systems();
//! assert_eq!(fund.capacity, 1_000_000.0);
//! assert_eq!(systems.len(), 4);
//! ```

pub mod backlog;
pub mod scenario;

pub use backlog::{mixed_fund, random_backlog, STATES, UTILITIES};
pub use scenario::{
    backlog_system, existing_system, scenario_fund, scenario_systems, ACCOUNT, CUSTOMER,
    DEVELOPER, STAGE,
};
