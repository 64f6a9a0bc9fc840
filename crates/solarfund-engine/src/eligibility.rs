//! Eligibility filtering by exclusion constraints.
//!
//! Applied per fund before any capacity accounting: a system excluded from
//! one fund may still be eligible for another.

use solarfund_core::{Condition, ConstraintResolutionError, Fund, SystemRecord};
use tracing::warn;

/// Active exclusion conditions of one fund.
#[derive(Debug, Clone)]
pub struct EligibilityFilter<'a> {
    rules: Vec<(&'a str, &'a Condition)>,
}

impl<'a> EligibilityFilter<'a> {
    /// Collects the usable conditions of every active exclusion of `fund`.
    ///
    /// Conditions that fail validation are skipped and returned as warnings.
    pub fn new(fund: &'a Fund) -> (Self, Vec<ConstraintResolutionError>) {
        let mut rules = Vec::new();
        let mut warnings = Vec::new();
        for constraint in fund.exclusions() {
            for (i, condition) in constraint.conditions.iter().enumerate() {
                match condition.validate() {
                    Ok(()) => rules.push((constraint.name.as_str(), condition)),
                    Err(e) => {
                        let err = ConstraintResolutionError::new(
                            &fund.name,
                            &constraint.name,
                            i,
                            e.to_string(),
                        );
                        warn!(event = "condition_skipped", %err);
                        warnings.push(err);
                    }
                }
            }
        }
        (Self { rules }, warnings)
    }

    /// Returns the name of the first exclusion `system` matches.
    pub fn excluded_by(&self, system: &SystemRecord) -> Option<&'a str> {
        self.rules
            .iter()
            .find(|(_, condition)| condition.matches(system))
            .map(|(name, _)| *name)
    }

    pub fn is_eligible(&self, system: &SystemRecord) -> bool {
        self.excluded_by(system).is_none()
    }

    /// Keeps the eligible systems, in order.
    pub fn filter<'s, I>(&self, systems: I) -> Vec<&'s SystemRecord>
    where
        I: IntoIterator<Item = &'s SystemRecord>,
    {
        systems
            .into_iter()
            .filter(|s| self.is_eligible(s))
            .collect()
    }
}
