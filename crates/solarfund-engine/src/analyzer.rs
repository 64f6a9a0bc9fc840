//! Constraint utilization reporting.

use solarfund_core::SystemRecord;

use crate::caps::FundBudgets;

/// Utilization of one budget.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintReportRow {
    /// Budget name, e.g. `"StateCap_CA"`.
    pub constraint_name: String,
    /// Constraint the budget came from.
    pub constraint: String,
    pub attribute: String,
    /// Measure the amounts below are expressed in.
    pub measure: String,
    pub usage: f64,
    pub upper_bound: f64,
    pub remaining_capacity: f64,
    /// `usage / upper_bound` as a fraction; 0 when the bound is 0.
    pub usage_percentage: f64,
    /// Backlog systems still unallocated that would consume this budget.
    pub backlog_systems_satisfying: usize,
    /// Their total measure.
    pub backlog_measure_satisfying: f64,
}

/// Builds one row per budget against the given backlog.
///
/// `backlog` should hold only systems that are still unallocated and
/// eligible for the fund. Reads state only.
pub fn analyze<'a, I>(budgets: &FundBudgets, backlog: I) -> Vec<ConstraintReportRow>
where
    I: IntoIterator<Item = &'a SystemRecord>,
{
    let mut counts = vec![0usize; budgets.len()];
    let mut measures = vec![0.0f64; budgets.len()];
    for system in backlog {
        for i in budgets.matching(system) {
            counts[i] += 1;
            measures[i] += budgets.budgets()[i].measure.measure_of(system);
        }
    }

    budgets
        .budgets()
        .iter()
        .zip(counts.into_iter().zip(measures))
        .map(|(budget, (count, measure))| ConstraintReportRow {
            constraint_name: budget.name.clone(),
            constraint: budget.constraint.clone(),
            attribute: budget.attribute.clone(),
            measure: budget.measure.name().to_string(),
            usage: budget.usage(),
            upper_bound: budget.cap,
            remaining_capacity: budget.remaining,
            usage_percentage: budget.usage_fraction(),
            backlog_systems_satisfying: count,
            backlog_measure_satisfying: measure,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarfund_core::{Condition, Constraint, Fund};
    use solarfund_test::{backlog_system, existing_system, scenario_fund};

    #[test]
    fn test_rows_report_usage_and_backlog() {
        let held = [existing_system("E1", 200_000.0, "CA", "F")];
        let existing: Vec<&SystemRecord> = held.iter().collect();
        let (budgets, _) =
            FundBudgets::initialize(&scenario_fund(), 1_000_000.0, &existing).unwrap();

        let backlog = [
            backlog_system("S1", 50_000.0, "CA"),
            backlog_system("S2", 70_000.0, "CA"),
            backlog_system("S3", 10_000.0, "NY"),
        ];
        let rows = analyze(&budgets, &backlog);

        assert_eq!(rows.len(), 2);
        let ca = &rows[0];
        assert_eq!(ca.constraint_name, "StateCap_CA");
        assert_eq!(ca.constraint, "StateCap");
        assert_eq!(ca.usage, 200_000.0);
        assert_eq!(ca.upper_bound, 500_000.0);
        assert_eq!(ca.remaining_capacity, 300_000.0);
        assert!((ca.usage_percentage - 0.4).abs() < 1e-12);
        assert_eq!(ca.backlog_systems_satisfying, 2);
        assert_eq!(ca.backlog_measure_satisfying, 120_000.0);

        let tx = &rows[1];
        assert_eq!(tx.usage, 0.0);
        assert_eq!(tx.backlog_systems_satisfying, 0);
    }

    #[test]
    fn test_zero_cap_row_never_divides() {
        let fund = Fund::new("F", 100.0).with_constraint(
            Constraint::upper_bound("Closed", "state", 0.0)
                .with_condition(Condition::one_of("state", ["CA"])),
        );
        let (budgets, _) = FundBudgets::initialize(&fund, 100.0, &[]).unwrap();
        let rows = analyze(&budgets, &[backlog_system("S", 5.0, "CA")]);
        assert_eq!(rows[0].usage_percentage, 0.0);
        assert!(rows[0].usage_percentage.is_finite());
        assert_eq!(rows[0].backlog_systems_satisfying, 1);
    }
}
