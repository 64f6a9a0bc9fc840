//! Constraint matching: which budgets a system would consume.

use smallvec::SmallVec;
use solarfund_core::SystemRecord;

use crate::caps::{BudgetSelector, FundBudgets};

/// Indices into [`FundBudgets::budgets`].
pub type MatchedBudgets = SmallVec<[usize; 4]>;

impl FundBudgets {
    /// Returns every budget `system` would consume if allocated to this fund.
    ///
    /// For each indexed attribute, an explicitly listed value selects its own
    /// budgets, if any; a value no active constraint names falls through to
    /// the attribute's OTHERS budgets. Predicate budgets are evaluated directly. A system without a
    /// value for an attribute is unconstrained on it.
    pub fn matching(&self, system: &SystemRecord) -> MatchedBudgets {
        let mut matched = MatchedBudgets::new();

        for (attribute, index) in &self.index {
            let Some(value) = system.attribute(attribute) else {
                continue;
            };
            match index.by_value.get(value) {
                Some(budgets) => matched.extend_from_slice(budgets),
                None if index.explicit.contains(value) => {}
                None => matched.extend_from_slice(&index.others),
            }
        }

        for &i in &self.predicates {
            if let BudgetSelector::Predicate(condition) = &self.budgets()[i].selector {
                if condition.matches(system) {
                    matched.push(i);
                }
            }
        }
        matched
    }

    /// Returns true if `system` would consume the budget at `index`.
    pub fn applies(&self, index: usize, system: &SystemRecord) -> bool {
        self.matching(system).contains(&index)
    }
}
