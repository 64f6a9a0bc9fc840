//! Capacity initialization.
//!
//! Expands a fund's upper-bound constraints into numeric [`Budget`]s against
//! a target capacity, nets out what the fund already holds, and indexes the
//! budgets by attribute value for the matcher.
//!
//! Budget naming follows the document: per-value budgets are
//! `"{constraint}_{value}"`, shared budgets carry the constraint name (with
//! `"_{attribute}"` appended when the constraint has several conditions, and
//! `"_{attribute}_{condition index}"` when two of them share an attribute).

use std::collections::{BTreeMap, BTreeSet};

use smallvec::SmallVec;
use solarfund_core::{
    resolve_bound, AllocationError, Condition, ConditionValue, Constraint,
    ConstraintResolutionError, Fund, Measure, Result, SystemRecord, OTHERS,
};
use tracing::{debug, warn};

/// Slack allowed when comparing amounts, absorbing summation error.
pub(crate) const EPSILON: f64 = 1e-6;

/// Which systems a budget applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum BudgetSelector {
    /// Systems whose attribute value is listed, plus, when `others` is set,
    /// systems whose value is not explicitly constrained on that attribute.
    Membership {
        values: BTreeSet<String>,
        others: bool,
    },
    /// Systems satisfying a non-membership condition.
    Predicate(Condition),
}

/// A numeric cap with its remaining headroom.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    /// Report name, e.g. `"StateCap_CA"`.
    pub name: String,
    /// Constraint the budget was derived from.
    pub constraint: String,
    pub attribute: String,
    pub measure: Measure,
    pub selector: BudgetSelector,
    /// Absolute cap.
    pub cap: f64,
    /// Headroom left; never negative and never above `cap`.
    pub remaining: f64,
}

impl Budget {
    /// Amount consumed so far, including pre-existing allocations.
    pub fn usage(&self) -> f64 {
        self.cap - self.remaining
    }

    /// `usage / cap`, or 0 for a zero cap.
    pub fn usage_fraction(&self) -> f64 {
        if self.cap > 0.0 {
            self.usage() / self.cap
        } else {
            0.0
        }
    }

    /// Returns true if `amount` fits in the remaining headroom.
    pub fn has_headroom(&self, amount: f64) -> bool {
        amount <= self.remaining + EPSILON
    }

    pub(crate) fn debit(&mut self, amount: f64) {
        self.remaining = (self.remaining - amount).max(0.0);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AttributeIndex {
    pub(crate) by_value: BTreeMap<String, SmallVec<[usize; 4]>>,
    pub(crate) others: SmallVec<[usize; 4]>,
    /// Every value some active constraint names on this attribute, whether
    /// or not it produced a budget. OTHERS never covers these.
    pub(crate) explicit: BTreeSet<String>,
}

/// All budgets of one fund for one run.
///
/// # Example
///
/// ```
/// use solarfund_core::{Condition, Constraint, Fund};
/// use solarfund_engine::FundBudgets;
///
/// let fund = Fund::new("F", 1_000_000.0).with_constraint(
///     Constraint::upper_bound("StateCap", "state", 0.5)
///         .per_value()
///         .with_condition(Condition::one_of("state", ["CA", "TX"])),
/// );
///
/// let (budgets, warnings) = FundBudgets::initialize(&fund, 1_000_000.0, &[]).unwrap();
/// assert!(warnings.is_empty());
/// assert_eq!(budgets.len(), 2);
/// assert_eq!(budgets.get("StateCap_TX").unwrap().cap, 500_000.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FundBudgets {
    fund: String,
    target: f64,
    budgets: Vec<Budget>,
    pub(crate) index: BTreeMap<String, AttributeIndex>,
    pub(crate) predicates: Vec<usize>,
}

impl FundBudgets {
    /// Builds the budgets of `fund` against `target`, net of what the
    /// `existing` systems already consume.
    ///
    /// Conditions that cannot yield a budget are skipped and returned as
    /// warnings.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::Configuration`] if `target` is not a
    /// positive finite amount.
    pub fn initialize(
        fund: &Fund,
        target: f64,
        existing: &[&SystemRecord],
    ) -> Result<(Self, Vec<ConstraintResolutionError>)> {
        if !target.is_finite() || target <= 0.0 {
            return Err(AllocationError::configuration(
                &fund.name,
                format!("target capacity must be positive, got {target}"),
            ));
        }

        let mut builder = Builder {
            fund: &fund.name,
            target,
            budgets: Vec::new(),
            warnings: Vec::new(),
        };
        for constraint in fund.budget_constraints() {
            builder.add_constraint(constraint);
        }

        let mut budgets = Self {
            fund: fund.name.clone(),
            target,
            budgets: builder.budgets,
            index: BTreeMap::new(),
            predicates: Vec::new(),
        };
        budgets.build_index(fund);
        budgets.net_out(existing);

        for budget in &budgets.budgets {
            debug!(
                event = "budget_initialized",
                fund = %budgets.fund,
                budget = %budget.name,
                attribute = %budget.attribute,
                cap = budget.cap,
                remaining = budget.remaining,
            );
        }
        Ok((budgets, builder.warnings))
    }

    fn build_index(&mut self, fund: &Fund) {
        for (i, budget) in self.budgets.iter().enumerate() {
            match &budget.selector {
                BudgetSelector::Membership { values, others } => {
                    let entry = self.index.entry(budget.attribute.clone()).or_default();
                    for value in values {
                        entry.by_value.entry(value.clone()).or_default().push(i);
                    }
                    if *others {
                        entry.others.push(i);
                    }
                }
                BudgetSelector::Predicate(_) => self.predicates.push(i),
            }
        }

        // Exclusions and skipped conditions still name their values.
        let named = fund
            .constraints
            .iter()
            .filter(|c| c.active)
            .flat_map(|c| &c.conditions);
        for condition in named {
            let Some(entry) = self.index.get_mut(&condition.attribute) else {
                continue;
            };
            for value in condition.value.values() {
                if value != OTHERS {
                    entry.explicit.insert(value.to_string());
                }
            }
        }
    }

    fn net_out(&mut self, existing: &[&SystemRecord]) {
        let mut used = vec![0.0; self.budgets.len()];
        for system in existing {
            for i in self.matching(system) {
                used[i] += self.budgets[i].measure.measure_of(system);
            }
        }
        for (budget, used) in self.budgets.iter_mut().zip(used) {
            budget.remaining = (budget.cap - used).max(0.0);
        }
    }

    pub fn fund(&self) -> &str {
        &self.fund
    }

    /// Target capacity the bounds were resolved against.
    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn budgets(&self) -> &[Budget] {
        &self.budgets
    }

    pub(crate) fn budget_mut(&mut self, index: usize) -> &mut Budget {
        &mut self.budgets[index]
    }

    /// Returns the budget with the given report name.
    pub fn get(&self, name: &str) -> Option<&Budget> {
        self.budgets.iter().find(|b| b.name == name)
    }

    /// Values explicitly constrained on `attribute`; OTHERS never covers them.
    pub fn constrained_values(&self, attribute: &str) -> impl Iterator<Item = &str> {
        self.index
            .get(attribute)
            .into_iter()
            .flat_map(|idx| idx.explicit.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }
}

struct Builder<'a> {
    fund: &'a str,
    target: f64,
    budgets: Vec<Budget>,
    warnings: Vec<ConstraintResolutionError>,
}

impl Builder<'_> {
    fn warn(&mut self, constraint: &Constraint, condition: usize, reason: impl Into<String>) {
        let err = ConstraintResolutionError::new(self.fund, &constraint.name, condition, reason);
        warn!(event = "condition_skipped", %err);
        self.warnings.push(err);
    }

    fn resolve(&self, bound: Option<f64>) -> std::result::Result<f64, String> {
        match bound {
            None => Err("upper bound is missing".to_string()),
            Some(b) if !b.is_finite() || b < 0.0 => {
                Err(format!("upper bound {b} is not a non-negative amount"))
            }
            Some(b) => Ok(resolve_bound(b, self.target)),
        }
    }

    fn add_constraint(&mut self, constraint: &Constraint) {
        if constraint.conditions.is_empty() {
            self.warn(constraint, 0, "upper-bound constraint has no conditions");
            return;
        }
        let shared_name = constraint.conditions.len() == 1;

        for (i, condition) in constraint.conditions.iter().enumerate() {
            if let Err(e) = condition.validate() {
                self.warn(constraint, i, e.to_string());
                continue;
            }
            let membership = condition.operator.is_inclusive_membership();
            if constraint.apply_per_value && membership {
                self.add_per_value(constraint, i, condition);
                continue;
            }
            if constraint.apply_per_value {
                self.warn(
                    constraint,
                    i,
                    format!(
                        "'{}' cannot fan out per value; using one shared budget",
                        condition.operator
                    ),
                );
            }

            let cap = match self.resolve(constraint.upper_bound) {
                Ok(cap) => cap,
                Err(reason) => {
                    self.warn(constraint, i, reason);
                    continue;
                }
            };
            let selector = if membership {
                let values: BTreeSet<String> = condition
                    .value
                    .values()
                    .into_iter()
                    .filter(|v| *v != OTHERS)
                    .map(str::to_string)
                    .collect();
                let others = condition.value.values().contains(&OTHERS);
                if values.is_empty() && !others {
                    self.warn(constraint, i, "condition lists no values");
                    continue;
                }
                BudgetSelector::Membership { values, others }
            } else {
                BudgetSelector::Predicate(condition.clone())
            };
            let name = if shared_name {
                constraint.name.clone()
            } else if attribute_repeats(constraint, &condition.attribute) {
                format!("{}_{}_{}", constraint.name, condition.attribute, i)
            } else {
                format!("{}_{}", constraint.name, condition.attribute)
            };
            self.push(constraint, condition, name, selector, cap);
        }
    }

    fn add_per_value(&mut self, constraint: &Constraint, i: usize, condition: &Condition) {
        let entries: Vec<(&str, Option<f64>)> = match &condition.value {
            ConditionValue::Bounded(bounds) => {
                bounds.iter().map(|(v, b)| (v.as_str(), Some(*b))).collect()
            }
            ConditionValue::List(_) | ConditionValue::Scalar(_) => condition
                .value
                .values()
                .into_iter()
                .map(|v| (v, constraint.upper_bound))
                .collect(),
        };
        if entries.is_empty() {
            self.warn(constraint, i, "condition lists no values");
            return;
        }

        let mut seen = BTreeSet::new();
        for (value, bound) in entries {
            if !seen.insert(value) {
                continue;
            }
            let cap = match self.resolve(bound) {
                Ok(cap) => cap,
                Err(reason) => {
                    self.warn(constraint, i, format!("value '{value}': {reason}"));
                    continue;
                }
            };
            let selector = if value == OTHERS {
                BudgetSelector::Membership {
                    values: BTreeSet::new(),
                    others: true,
                }
            } else {
                BudgetSelector::Membership {
                    values: BTreeSet::from([value.to_string()]),
                    others: false,
                }
            };
            let name = format!("{}_{}", constraint.name, value);
            self.push(constraint, condition, name, selector, cap);
        }
    }

    fn push(
        &mut self,
        constraint: &Constraint,
        condition: &Condition,
        name: String,
        selector: BudgetSelector,
        cap: f64,
    ) {
        self.budgets.push(Budget {
            name,
            constraint: constraint.name.clone(),
            attribute: condition.attribute.clone(),
            measure: constraint.measure.clone(),
            selector,
            cap,
            remaining: cap,
        });
    }
}

fn attribute_repeats(constraint: &Constraint, attribute: &str) -> bool {
    constraint
        .conditions
        .iter()
        .filter(|c| c.attribute == attribute)
        .count()
        > 1
}

#[cfg(test)]
#[path = "caps_tests.rs"]
mod tests;
