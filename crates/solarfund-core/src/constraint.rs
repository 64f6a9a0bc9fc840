//! Declarative allocation constraints.
//!
//! A constraint is either an upper bound (a budget on how much of a measure
//! a fund may hold among systems matching its conditions) or an exclusion
//! (a binary eligibility filter). Exclusions never carry a budget, whatever
//! their `upper_bound` says.

use std::fmt;

use crate::condition::Condition;
use crate::system::Measure;

/// Reporting category of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintCategory {
    Geographic,
    Equipment,
    Partner,
}

/// Whether a constraint budgets or excludes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConstraintKind {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "Upper Bound", alias = "UpperBound"))]
    UpperBound,
    #[cfg_attr(feature = "serde", serde(rename = "Exclusion"))]
    Exclusion,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintKind::UpperBound => f.write_str("Upper Bound"),
            ConstraintKind::Exclusion => f.write_str("Exclusion"),
        }
    }
}

/// Resolves a fraction-or-absolute bound against a base amount.
///
/// Bounds up to and including 1 are fractions of `base`; larger bounds are
/// absolute currency amounts.
///
/// # Example
///
/// ```
/// use solarfund_core::resolve_bound;
///
/// assert_eq!(resolve_bound(0.5, 1_000_000.0), 500_000.0);
/// assert_eq!(resolve_bound(1.0, 1_000_000.0), 1_000_000.0);
/// assert_eq!(resolve_bound(250_000.0, 1_000_000.0), 250_000.0);
/// ```
pub fn resolve_bound(bound: f64, base: f64) -> f64 {
    if bound <= 1.0 {
        bound * base
    } else {
        bound
    }
}

/// One constraint of a fund.
///
/// # Example
///
/// ```
/// use solarfund_core::{Condition, Constraint, ConstraintKind};
///
/// let c = Constraint::upper_bound("StateCap", "state", 0.4)
///     .per_value()
///     .with_condition(Condition::one_of("state", ["CA", "TX"]));
///
/// assert_eq!(c.kind, ConstraintKind::UpperBound);
/// assert!(c.apply_per_value);
/// assert!(c.is_budget());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Unique within its fund.
    pub name: String,
    pub category: Option<ConstraintCategory>,
    pub kind: ConstraintKind,
    /// Primary attribute the constraint is about.
    pub attribute: String,
    pub measure: Measure,
    /// Fraction (`<= 1`) or absolute amount. Ignored for exclusions.
    pub upper_bound: Option<f64>,
    /// Carried for document round-trips; allocation always sums.
    pub aggregation: Option<String>,
    /// Fan out one budget per listed value instead of one shared budget.
    pub apply_per_value: bool,
    pub conditions: Vec<Condition>,
    pub active: bool,
    pub group_name: Option<String>,
}

impl Constraint {
    fn base(name: impl Into<String>, attribute: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            name: name.into(),
            category: None,
            kind,
            attribute: attribute.into(),
            measure: Measure::Fmv,
            upper_bound: None,
            aggregation: None,
            apply_per_value: false,
            conditions: Vec::new(),
            active: true,
            group_name: None,
        }
    }

    /// Creates an active upper-bound constraint with the given bound.
    pub fn upper_bound(name: impl Into<String>, attribute: impl Into<String>, bound: f64) -> Self {
        Self {
            upper_bound: Some(bound),
            ..Self::base(name, attribute, ConstraintKind::UpperBound)
        }
    }

    /// Creates an active exclusion constraint.
    pub fn exclusion(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::base(name, attribute, ConstraintKind::Exclusion)
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Switches to one budget per listed value.
    pub fn per_value(mut self) -> Self {
        self.apply_per_value = true;
        self
    }

    pub fn with_category(mut self, category: ConstraintCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_measure(mut self, measure: Measure) -> Self {
        self.measure = measure;
        self
    }

    pub fn with_group_name(mut self, group_name: impl Into<String>) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    /// Marks the constraint inactive; inactive constraints are ignored.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Returns true if this constraint contributes capacity budgets.
    pub fn is_budget(&self) -> bool {
        self.active && self.kind == ConstraintKind::UpperBound
    }

    /// Returns true if this constraint filters eligibility.
    pub fn is_active_exclusion(&self) -> bool {
        self.active && self.kind == ConstraintKind::Exclusion
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_bound_fraction_and_absolute() {
        assert_eq!(resolve_bound(0.0, 10.0), 0.0);
        assert_eq!(resolve_bound(0.25, 1000.0), 250.0);
        assert_eq!(resolve_bound(1.5, 1000.0), 1.5);
        assert_eq!(resolve_bound(5000.0, 1000.0), 5000.0);
    }

    #[test]
    fn test_exclusion_is_not_budget() {
        let mut c = Constraint::exclusion("NoHI", "state");
        c.upper_bound = Some(0.5);
        assert!(!c.is_budget());
        assert!(c.is_active_exclusion());
        assert!(!c.inactive().is_active_exclusion());
    }

    #[test]
    fn test_inactive_upper_bound_is_not_budget() {
        let c = Constraint::upper_bound("Cap", "state", 0.5).inactive();
        assert!(!c.is_budget());
    }

    #[test]
    fn test_builder_defaults() {
        let c = Constraint::upper_bound("Cap", "state", 0.5)
            .with_category(ConstraintCategory::Geographic)
            .with_group_name("West");
        assert_eq!(c.measure, Measure::Fmv);
        assert!(!c.apply_per_value);
        assert!(c.active);
        assert_eq!(c.group_name.as_deref(), Some("West"));
        assert_eq!(c.kind.to_string(), "Upper Bound");
    }
}
