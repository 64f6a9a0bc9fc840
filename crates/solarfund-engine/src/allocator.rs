//! Greedy allocation.
//!
//! Placements pair a backlog system with a fund that may take it. They are
//! visited once, largest FMV first, and a system leaves the pool for every
//! fund the moment one fund admits it. Admission is all-or-nothing: the fund
//! remainder, every matched budget, and the customer cap (when enabled) must
//! all have headroom, and all are debited together.
//!
//! Logging levels: TRACE for each admission and rejection.

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use num_format::{Locale, ToFormattedString};
use solarfund_core::SystemRecord;
use tracing::trace;

use crate::caps::{FundBudgets, EPSILON};

/// Why a fund turned a system down.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The fund's own remaining capacity was too small.
    FundCapacity,
    /// A constraint budget was too small for a system with this value.
    Budget {
        budget: String,
        attribute: String,
        value: String,
    },
    /// The customer account reached the per-customer cap.
    CustomerCap { account: String },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::FundCapacity => f.write_str("Fund capacity exceeded"),
            Rejection::Budget {
                budget,
                attribute,
                value,
            } => write!(
                f,
                "Constraint '{budget}' on {attribute}='{value}' exceeded capacity"
            ),
            Rejection::CustomerCap { account } => {
                write!(f, "Customer account '{account}' exceeded the per-customer cap")
            }
        }
    }
}

/// How often a rejection happened and by how much at worst.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RejectionTally {
    pub systems: usize,
    pub largest_shortfall: f64,
}

/// Rejections of one fund, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct RejectionLog {
    entries: IndexMap<Rejection, RejectionTally>,
}

impl RejectionLog {
    pub fn record(&mut self, rejection: Rejection, shortfall: f64) {
        let tally = self.entries.entry(rejection).or_default();
        tally.systems += 1;
        tally.largest_shortfall = tally.largest_shortfall.max(shortfall);
    }

    pub fn get(&self, rejection: &Rejection) -> Option<&RejectionTally> {
        self.entries.get(rejection)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rejection, &RejectionTally)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One human-readable line per distinct rejection.
    ///
    /// e.g. `Constraint 'StateCap_CA' on state='CA' exceeded capacity (1 system,
    /// largest shortfall 100,000.00)`
    pub fn reasons(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(rejection, tally)| {
                format!(
                    "{rejection} ({} system{}, largest shortfall {})",
                    tally.systems,
                    if tally.systems == 1 { "" } else { "s" },
                    format_amount(tally.largest_shortfall),
                )
            })
            .collect()
    }
}

/// Formats a currency amount with thousands separators and two decimals.
pub fn format_amount(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{sign}{}.{:02}",
        (cents / 100).to_formatted_string(&Locale::en),
        cents % 100
    )
}

#[derive(Debug, Clone)]
struct CustomerCap {
    column: String,
    cap: f64,
    used: HashMap<String, f64>,
}

/// Allocation state of one fund during a run.
///
/// Owns the fund's budgets exclusively until the run finishes.
#[derive(Debug, Clone)]
pub struct FundLedger {
    budgets: FundBudgets,
    remaining: f64,
    eligible: Vec<bool>,
    customer_cap: Option<CustomerCap>,
    allocated: Vec<usize>,
    allocated_fmv: f64,
    rejections: RejectionLog,
}

impl FundLedger {
    /// Creates a ledger with `remaining` fund-level capacity.
    ///
    /// `eligible[i]` says whether backlog system `i` passed this fund's
    /// eligibility filter.
    pub fn new(budgets: FundBudgets, remaining: f64, eligible: Vec<bool>) -> Self {
        Self {
            budgets,
            remaining: remaining.max(0.0),
            eligible,
            customer_cap: None,
            allocated: Vec::new(),
            allocated_fmv: 0.0,
            rejections: RejectionLog::default(),
        }
    }

    /// Caps the FMV any one customer account may hold in this fund,
    /// counting what `existing` systems already hold.
    pub fn with_customer_cap(
        mut self,
        column: impl Into<String>,
        cap: f64,
        existing: &[&SystemRecord],
    ) -> Self {
        let column = column.into();
        let mut used: HashMap<String, f64> = HashMap::new();
        for system in existing {
            if let Some(account) = system.attribute(&column) {
                *used.entry(account.to_string()).or_default() += system.fmv;
            }
        }
        self.customer_cap = Some(CustomerCap { column, cap, used });
        self
    }

    pub fn fund(&self) -> &str {
        self.budgets.fund()
    }

    pub fn budgets(&self) -> &FundBudgets {
        &self.budgets
    }

    /// Fund-level capacity left.
    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    pub fn is_eligible(&self, system: usize) -> bool {
        self.eligible.get(system).copied().unwrap_or(false)
    }

    /// Backlog indices admitted so far, in admission order.
    pub fn allocated(&self) -> &[usize] {
        &self.allocated
    }

    pub fn allocated_fmv(&self) -> f64 {
        self.allocated_fmv
    }

    pub fn rejections(&self) -> &RejectionLog {
        &self.rejections
    }

    /// Admits backlog system `index` if everything it touches has headroom.
    ///
    /// On rejection every failing check is tallied and nothing is debited.
    pub fn try_admit(&mut self, index: usize, system: &SystemRecord) -> bool {
        let matched = self.budgets.matching(system);
        let mut admissible = true;

        if system.fmv > self.remaining + EPSILON {
            self.rejections
                .record(Rejection::FundCapacity, system.fmv - self.remaining);
            admissible = false;
        }

        for &i in &matched {
            let budget = &self.budgets.budgets()[i];
            let amount = budget.measure.measure_of(system);
            if !budget.has_headroom(amount) {
                let rejection = Rejection::Budget {
                    budget: budget.name.clone(),
                    attribute: budget.attribute.clone(),
                    value: system.attribute(&budget.attribute).unwrap_or_default().to_string(),
                };
                let shortfall = amount - budget.remaining;
                self.rejections.record(rejection, shortfall);
                admissible = false;
            }
        }

        let account = self.customer_cap.as_ref().and_then(|c| {
            let account = system.attribute(&c.column)?.to_string();
            let used = c.used.get(&account).copied().unwrap_or(0.0);
            Some((account, used, c.cap))
        });
        if let Some((account, used, cap)) = &account {
            if used + system.fmv > cap + EPSILON {
                let shortfall = used + system.fmv - cap;
                self.rejections.record(
                    Rejection::CustomerCap {
                        account: account.clone(),
                    },
                    shortfall,
                );
                admissible = false;
            }
        }

        if !admissible {
            trace!(event = "reject", fund = %self.fund(), system = %system.id, fmv = system.fmv);
            return false;
        }

        self.remaining = (self.remaining - system.fmv).max(0.0);
        for &i in &matched {
            let amount = self.budgets.budgets()[i].measure.measure_of(system);
            self.budgets.budget_mut(i).debit(amount);
        }
        if let (Some(cap), Some((account, _, _))) = (self.customer_cap.as_mut(), account) {
            *cap.used.entry(account).or_default() += system.fmv;
        }
        self.allocated.push(index);
        self.allocated_fmv += system.fmv;

        trace!(
            event = "admit",
            fund = %self.fund(),
            system = %system.id,
            fmv = system.fmv,
            remaining = self.remaining,
        );
        true
    }

    pub(crate) fn into_parts(self) -> (FundBudgets, Vec<bool>, Vec<usize>, RejectionLog) {
        (self.budgets, self.eligible, self.allocated, self.rejections)
    }
}

/// A (system, fund) pair the allocator will try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub system: usize,
    pub fund: usize,
}

/// Orders every eligible placement by FMV descending across all funds.
///
/// The sort is stable: ties keep backlog order, then ledger order, so for
/// any one system earlier funds get the first offer.
pub fn placements(backlog: &[&SystemRecord], ledgers: &[FundLedger]) -> Vec<Placement> {
    let mut placements: Vec<Placement> = (0..backlog.len())
        .flat_map(|system| (0..ledgers.len()).map(move |fund| Placement { system, fund }))
        .filter(|p| ledgers[p.fund].is_eligible(p.system))
        .collect();
    placements.sort_by(|a, b| backlog[b.system].fmv.total_cmp(&backlog[a.system].fmv));
    placements
}

/// Runs one greedy pass over `backlog` for all `ledgers`.
///
/// Returns, per backlog index, the ledger that admitted the system.
pub fn allocate(backlog: &[&SystemRecord], ledgers: &mut [FundLedger]) -> Vec<Option<usize>> {
    let mut assignment: Vec<Option<usize>> = vec![None; backlog.len()];
    for placement in placements(backlog, ledgers) {
        if assignment[placement.system].is_some() {
            continue;
        }
        let system = backlog[placement.system];
        if ledgers[placement.fund].try_admit(placement.system, system) {
            assignment[placement.system] = Some(placement.fund);
        }
    }
    assignment
}

#[cfg(test)]
#[path = "allocator_tests.rs"]
mod tests;
