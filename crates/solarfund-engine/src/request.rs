//! Allocation requests and their outcomes.
//!
//! A request carries everything a run needs: the dataset, the funds with
//! their targets, and the run settings. Nothing is read from ambient state.
//!
//! # Logging levels
//!
//! - **INFO**: run and fund lifecycle (`allocation_start`, `fund_start`,
//!   `fund_end`, `allocation_end`)
//! - **DEBUG**: budget initialization
//! - **TRACE**: individual admissions and rejections
//! - **WARN**: skipped conditions and failed funds (`fund_failed`)

use std::collections::{HashMap, HashSet};

use solarfund_config::AllocationConfig;
use solarfund_core::{
    AllocationError, ConstraintResolutionError, Fund, FundTarget, Measure, Result, SystemRecord,
    SystemTable, TargetCapacity,
};
use tracing::{info, warn};

use crate::allocator::{allocate, FundLedger, RejectionLog};
use crate::analyzer::{analyze, ConstraintReportRow};
use crate::caps::FundBudgets;
use crate::eligibility::EligibilityFilter;

/// Input of one allocation run.
#[derive(Debug, Clone, Default)]
pub struct AllocationRequest {
    pub systems: SystemTable,
    /// Funds in priority order; earlier funds get the first offer of
    /// equally valued systems.
    pub funds: Vec<FundTarget>,
    pub settings: AllocationConfig,
}

impl AllocationRequest {
    pub fn new(systems: SystemTable) -> Self {
        Self {
            systems,
            funds: Vec::new(),
            settings: AllocationConfig::default(),
        }
    }

    pub fn with_settings(mut self, settings: AllocationConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_fund(mut self, fund: FundTarget) -> Self {
        self.funds.push(fund);
        self
    }

    /// Adds funds picked by name from `available`.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::UnknownFund`] for a name not in `available`.
    pub fn with_selected_funds<I, S>(mut self, available: &[Fund], selection: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, TargetCapacity)>,
        S: AsRef<str>,
    {
        for (name, target) in selection {
            let name = name.as_ref();
            let fund = available
                .iter()
                .find(|f| f.name == name)
                .ok_or_else(|| AllocationError::UnknownFund(name.to_string()))?;
            self.funds.push(FundTarget::new(fund.clone(), target));
        }
        Ok(self)
    }

    /// Columns the run reads: customer and stage, the customer account when
    /// the per-customer cap is on, and every column referenced by a usable
    /// condition or measure of an active constraint.
    pub fn required_columns(&self) -> Vec<&str> {
        let columns = &self.settings.columns;
        let mut required = vec![columns.customer.as_str(), columns.stage.as_str()];
        if self.settings.per_customer_cap.is_some() {
            required.push(columns.customer_account.as_str());
        }
        for target in &self.funds {
            for constraint in target.fund.constraints.iter().filter(|c| c.active) {
                if constraint.is_budget() {
                    if let Measure::Column(column) = &constraint.measure {
                        required.push(column.as_str());
                    }
                }
                required.extend(
                    constraint
                        .conditions
                        .iter()
                        .filter(|c| c.validate().is_ok())
                        .map(|c| c.attribute.as_str()),
                );
            }
        }
        required
    }

    /// Checks the dataset schema.
    ///
    /// # Errors
    ///
    /// Returns [`AllocationError::DataShape`] listing every missing column.
    pub fn validate(&self) -> Result<()> {
        self.systems.require_columns(self.required_columns())?;
        Ok(())
    }
}

/// Result of a run for one fund.
#[derive(Debug, Clone)]
pub struct FundOutcome {
    pub fund: String,
    /// Resolved target capacity.
    pub target: f64,
    /// FMV the fund already held before the run.
    pub previously_allocated: f64,
    /// Fund-level capacity available to the run.
    pub starting_capacity: f64,
    /// Admitted systems, in admission order.
    pub allocated: Vec<SystemRecord>,
    pub allocated_fmv: f64,
    /// Fund-level capacity left after the run.
    pub remaining_capacity: f64,
    /// Share of the target held after the run, in percent.
    pub percent_of_target: f64,
    pub rejections: RejectionLog,
    /// De-duplicated rejection reasons, one line each.
    pub infeasible_reasons: Vec<String>,
    pub report: Vec<ConstraintReportRow>,
    /// Final budgets.
    pub budgets: FundBudgets,
    /// Conditions skipped while preparing the fund.
    pub warnings: Vec<ConstraintResolutionError>,
}

/// A fund that could not take part in a run.
#[derive(Debug)]
pub struct FundFailure {
    pub fund: String,
    pub error: AllocationError,
}

/// Result of a run.
#[derive(Debug)]
pub struct AllocationOutcome {
    /// Funds that ran, in request order.
    pub funds: Vec<FundOutcome>,
    pub failures: Vec<FundFailure>,
    /// Backlog systems no fund admitted.
    pub unallocated: Vec<SystemRecord>,
}

impl AllocationOutcome {
    pub fn fund(&self, name: &str) -> Option<&FundOutcome> {
        self.funds.iter().find(|f| f.fund == name)
    }

    /// FMV admitted across all funds.
    pub fn allocated_fmv(&self) -> f64 {
        self.funds.iter().map(|f| f.allocated_fmv).sum()
    }
}

/// Constraint status of one fund before allocating.
#[derive(Debug, Clone)]
pub struct FundPreview {
    pub fund: String,
    pub target: f64,
    pub previously_allocated: f64,
    pub remaining_capacity: f64,
    /// Backlog systems that pass the fund's exclusions.
    pub eligible_backlog: usize,
    /// Backlog systems removed by the fund's exclusions.
    pub excluded_backlog: usize,
    pub report: Vec<ConstraintReportRow>,
    pub warnings: Vec<ConstraintResolutionError>,
}

struct Split<'a> {
    backlog: Vec<&'a SystemRecord>,
    existing: HashMap<&'a str, Vec<&'a SystemRecord>>,
}

fn split(request: &AllocationRequest) -> Split<'_> {
    let settings = &request.settings;
    let columns = &settings.columns;
    let funds: HashSet<&str> = request.funds.iter().map(|f| f.fund.name.as_str()).collect();

    let mut backlog = Vec::new();
    let mut existing: HashMap<&str, Vec<&SystemRecord>> = HashMap::new();
    for system in &request.systems {
        let customer = system.attribute(&columns.customer).unwrap_or_default();
        let stage = system.attribute(&columns.stage).unwrap_or_default();

        if funds.contains(customer) {
            if !settings.existing.excluded_stages.iter().any(|s| s == stage) {
                existing.entry(customer).or_default().push(system);
            }
            continue;
        }
        let owned = settings
            .backlog
            .customer
            .as_deref()
            .map_or(true, |owner| owner == customer);
        if owned && !settings.backlog.excluded_stages.iter().any(|s| s == stage) {
            backlog.push(system);
        }
    }
    Split { backlog, existing }
}

struct Prepared<'a> {
    target: f64,
    previously_allocated: f64,
    remaining: f64,
    budgets: FundBudgets,
    eligible: Vec<bool>,
    existing: Vec<&'a SystemRecord>,
    warnings: Vec<ConstraintResolutionError>,
}

fn prepare<'a>(fund_target: &FundTarget, split: &Split<'a>) -> Result<Prepared<'a>> {
    let fund = &fund_target.fund;
    let target = fund_target.resolve()?;
    let existing = split
        .existing
        .get(fund.name.as_str())
        .cloned()
        .unwrap_or_default();
    let previously_allocated: f64 = existing.iter().map(|s| s.fmv).sum();

    let (budgets, mut warnings) = FundBudgets::initialize(fund, target, &existing)?;
    let (filter, exclusion_warnings) = EligibilityFilter::new(fund);
    warnings.extend(exclusion_warnings);
    let eligible = split.backlog.iter().map(|s| filter.is_eligible(s)).collect();

    Ok(Prepared {
        target,
        previously_allocated,
        remaining: (target - previously_allocated).max(0.0),
        budgets,
        eligible,
        existing,
        warnings,
    })
}

struct FundStart {
    target: f64,
    previously_allocated: f64,
    starting_capacity: f64,
    warnings: Vec<ConstraintResolutionError>,
}

/// Runs one allocation over every fund of the request.
///
/// The dataset schema is checked first; a missing column fails the whole
/// run before anything is allocated. A fund whose target cannot be resolved
/// is reported in [`AllocationOutcome::failures`] while the others proceed.
///
/// # Examples
///
/// ```
/// use solarfund_core::{Condition, Constraint, Fund, FundTarget, SystemRecord, SystemTable};
/// use solarfund_engine::{run_allocation, AllocationRequest};
///
/// let fund = Fund::new("F", 1_000.0).with_constraint(
///     Constraint::upper_bound("CaCap", "state", 0.5)
///         .with_condition(Condition::one_of("state", ["CA"])),
/// );
///
/// let mut systems = SystemTable::new(["Asset Portfolio - Customer", "Stage", "state"]);
/// for (id, fmv, state) in [("A", 400.0, "CA"), ("B", 300.0, "CA"), ("C", 200.0, "TX")] {
///     systems.push(
///         SystemRecord::new(id, fmv)
///             .with_attribute("Asset Portfolio - Customer", "Developer")
///             .with_attribute("Stage", "Pending")
///             .with_attribute("state", state),
///     ).unwrap();
/// }
///
/// let request = AllocationRequest::new(systems).with_fund(FundTarget::full(fund));
/// let outcome = run_allocation(&request).unwrap();
///
/// let f = outcome.fund("F").unwrap();
/// assert_eq!(f.allocated_fmv, 600.0);
/// assert_eq!(outcome.unallocated.len(), 1);
/// ```
pub fn run_allocation(request: &AllocationRequest) -> Result<AllocationOutcome> {
    request.validate()?;
    let split = split(request);
    info!(
        event = "allocation_start",
        systems = request.systems.len(),
        backlog = split.backlog.len(),
        funds = request.funds.len(),
    );

    let mut ledgers = Vec::with_capacity(request.funds.len());
    let mut starts = Vec::with_capacity(request.funds.len());
    let mut failures = Vec::new();
    let mut seen = HashSet::new();

    for fund_target in &request.funds {
        let name = fund_target.fund.name.as_str();
        let prepared = if seen.insert(name) {
            prepare(fund_target, &split)
        } else {
            Err(AllocationError::configuration(
                name,
                "fund is requested more than once",
            ))
        };
        let prepared = match prepared {
            Ok(p) => p,
            Err(error) => {
                warn!(event = "fund_failed", fund = name, %error);
                failures.push(FundFailure {
                    fund: name.to_string(),
                    error,
                });
                continue;
            }
        };

        info!(
            event = "fund_start",
            fund = name,
            target = prepared.target,
            previously_allocated = prepared.previously_allocated,
            remaining = prepared.remaining,
            budgets = prepared.budgets.len(),
            eligible = prepared.eligible.iter().filter(|e| **e).count(),
        );
        let mut ledger = FundLedger::new(prepared.budgets, prepared.remaining, prepared.eligible);
        if let Some(cap) = request.settings.per_customer_cap {
            ledger = ledger.with_customer_cap(
                &request.settings.columns.customer_account,
                cap,
                &prepared.existing,
            );
        }
        ledgers.push(ledger);
        starts.push(FundStart {
            target: prepared.target,
            previously_allocated: prepared.previously_allocated,
            starting_capacity: prepared.remaining,
            warnings: prepared.warnings,
        });
    }

    let assignment = allocate(&split.backlog, &mut ledgers);

    let funds: Vec<FundOutcome> = ledgers
        .into_iter()
        .zip(starts)
        .map(|(ledger, start)| {
            let fund = ledger.fund().to_string();
            let remaining_capacity = ledger.remaining();
            let allocated_fmv = ledger.allocated_fmv();
            let (budgets, eligible, allocated, rejections) = ledger.into_parts();

            let open = split
                .backlog
                .iter()
                .enumerate()
                .filter(|(i, _)| assignment[*i].is_none() && eligible[*i])
                .map(|(_, s)| *s);
            let report = analyze(&budgets, open);

            let outcome = FundOutcome {
                percent_of_target: (start.previously_allocated + allocated_fmv) / start.target
                    * 100.0,
                allocated: allocated.iter().map(|&i| split.backlog[i].clone()).collect(),
                infeasible_reasons: rejections.reasons(),
                fund,
                target: start.target,
                previously_allocated: start.previously_allocated,
                starting_capacity: start.starting_capacity,
                allocated_fmv,
                remaining_capacity,
                rejections,
                report,
                budgets,
                warnings: start.warnings,
            };
            info!(
                event = "fund_end",
                fund = %outcome.fund,
                allocated = outcome.allocated.len(),
                allocated_fmv = outcome.allocated_fmv,
                percent_of_target = outcome.percent_of_target,
                rejected = outcome.rejections.len(),
            );
            outcome
        })
        .collect();

    let unallocated: Vec<SystemRecord> = split
        .backlog
        .iter()
        .zip(&assignment)
        .filter(|(_, a)| a.is_none())
        .map(|(s, _)| (*s).clone())
        .collect();

    let outcome = AllocationOutcome {
        funds,
        failures,
        unallocated,
    };
    info!(
        event = "allocation_end",
        allocated = split.backlog.len() - outcome.unallocated.len(),
        allocated_fmv = outcome.allocated_fmv(),
        unallocated = outcome.unallocated.len(),
        failed = outcome.failures.len(),
    );
    Ok(outcome)
}

/// Reports each fund's constraint status against its eligible backlog
/// without allocating.
///
/// # Errors
///
/// Fails on a missing column, or with the first fund whose target cannot be
/// resolved.
pub fn preview(request: &AllocationRequest) -> Result<Vec<FundPreview>> {
    request.validate()?;
    let split = split(request);

    request
        .funds
        .iter()
        .map(|fund_target| {
            let prepared = prepare(fund_target, &split)?;
            let eligible: Vec<&SystemRecord> = split
                .backlog
                .iter()
                .zip(&prepared.eligible)
                .filter(|(_, e)| **e)
                .map(|(s, _)| *s)
                .collect();
            let report = analyze(&prepared.budgets, eligible.iter().copied());

            Ok(FundPreview {
                fund: fund_target.fund.name.clone(),
                target: prepared.target,
                previously_allocated: prepared.previously_allocated,
                remaining_capacity: prepared.remaining,
                eligible_backlog: eligible.len(),
                excluded_backlog: split.backlog.len() - eligible.len(),
                report,
                warnings: prepared.warnings,
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
