//! Funds and allocation targets.

use std::collections::HashSet;

use crate::constraint::Constraint;
use crate::error::{AllocationError, Result};

/// A capital vehicle with a capacity and its allocation constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct Fund {
    /// Unique fund name; also the customer value of systems it already holds.
    pub name: String,
    /// Nominal capacity in currency units.
    pub capacity: f64,
    pub constraints: Vec<Constraint>,
}

impl Fund {
    pub fn new(name: impl Into<String>, capacity: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
            constraints: Vec::new(),
        }
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns the constraint with the given name.
    pub fn constraint(&self, name: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Active upper-bound constraints.
    pub fn budget_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_budget())
    }

    /// Active exclusion constraints.
    pub fn exclusions(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter().filter(|c| c.is_active_exclusion())
    }

    /// Returns the first constraint name used twice, if any.
    pub fn duplicate_constraint_name(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.constraints
            .iter()
            .map(|c| c.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

/// How much of a fund a run should aim to fill.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum TargetCapacity {
    /// The fund's nominal capacity.
    #[default]
    FullCapacity,
    /// A percentage of nominal capacity, e.g. `80.0`.
    Percentage(f64),
    /// An absolute currency amount.
    Absolute(f64),
}

/// A fund paired with the target a run allocates toward.
///
/// # Example
///
/// ```
/// use solarfund_core::{Fund, FundTarget, TargetCapacity};
///
/// let target = FundTarget::new(Fund::new("F", 1_000_000.0), TargetCapacity::Percentage(80.0));
/// assert_eq!(target.resolve().unwrap(), 800_000.0);
///
/// let empty = FundTarget::full(Fund::new("G", 0.0));
/// assert!(empty.resolve().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FundTarget {
    pub fund: Fund,
    pub target: TargetCapacity,
}

impl FundTarget {
    pub fn new(fund: Fund, target: TargetCapacity) -> Self {
        Self { fund, target }
    }

    /// Targets the fund's full nominal capacity.
    pub fn full(fund: Fund) -> Self {
        Self::new(fund, TargetCapacity::FullCapacity)
    }

    /// Resolves the target to an absolute amount.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Configuration`] if the amount is not a
    /// positive finite number; fractional bounds have no base otherwise.
    pub fn resolve(&self) -> Result<f64> {
        let amount = match self.target {
            TargetCapacity::FullCapacity => self.fund.capacity,
            TargetCapacity::Percentage(p) => self.fund.capacity * p / 100.0,
            TargetCapacity::Absolute(a) => a,
        };
        if amount.is_finite() && amount > 0.0 {
            Ok(amount)
        } else {
            Err(AllocationError::configuration(
                &self.fund.name,
                format!("target capacity must be positive, got {amount}"),
            ))
        }
    }
}
